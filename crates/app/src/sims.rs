//! Demo simulations shipped with the command line driver.

use std::f32::consts::TAU;

use simstage_core::{
    ModuleBus, ObjectId, ObjectKind, ParamReceiver, ParamSpec, Result, SceneObject, Simulation,
    SimulationContext, SimulationFactory, SoundNode, Waveform,
};

pub fn catalog() -> Vec<SimulationFactory> {
    vec![
        SimulationFactory::new("drone", Drone::new),
        SimulationFactory::new("chimes", Chimes::new),
    ]
}

pub fn find(name: &str) -> Option<SimulationFactory> {
    catalog().into_iter().find(|factory| factory.name() == name)
}

/// Sustained sawtooth tone with pitch and level exposed on a parameter panel.
pub struct Drone {
    ctx: SimulationContext,
    params: ParamReceiver,
    body: Option<ObjectId>,
    sound: Option<SoundNode>,
    pitch: f32,
    level: f32,
    phase: f32,
}

impl Drone {
    pub fn new(ctx: SimulationContext) -> Result<Self> {
        let (panel, params) = ctx.container.param_panel("Drone");
        panel.add_param(
            "pitch",
            ParamSpec::new(110.0, 55.0, 880.0).step(1.0).label("Pitch (Hz)"),
        );
        panel.add_param("level", ParamSpec::new(0.4, 0.0, 1.0).label("Level"));
        Ok(Self {
            ctx,
            params,
            body: None,
            sound: None,
            pitch: 110.0,
            level: 0.4,
            phase: 0.0,
        })
    }

    fn apply_params(&mut self) {
        for change in self.params.drain() {
            match change.key.as_str() {
                "pitch" => self.pitch = change.value,
                "level" => self.level = change.value,
                other => tracing::warn!(key = other, "drone ignores parameter"),
            }
        }
        if let Some(sound) = self.sound {
            self.ctx.audio.set_sound_frequency(sound, self.pitch);
            self.ctx.audio.set_sound_level(sound, self.level);
        }
    }
}

impl Simulation for Drone {
    fn on_enter(&mut self) {
        self.ctx.renderer.set_clear_color([0.02, 0.02, 0.05]);
        self.ctx.camera.look_at([0.0, 1.5, 6.0], [0.0; 3]);
        self.body = Some(
            self.ctx
                .scene
                .add(SceneObject::new("drone-core", ObjectKind::Mesh)),
        );
        self.ctx
            .scene
            .add(SceneObject::new("key-light", ObjectKind::Light).at([2.0, 4.0, 2.0]));
    }

    fn on_audio_start(&mut self, bus: ModuleBus) {
        self.sound = self
            .ctx
            .audio
            .create_sound_node(Waveform::Sawtooth, self.pitch, Some(bus));
        if let Some(sound) = self.sound {
            self.ctx.audio.set_sound_level(sound, self.level);
        }
    }

    fn on_audio_stop(&mut self) {
        self.sound = None;
    }

    fn update(&mut self, delta: f32) {
        self.apply_params();
        self.phase = (self.phase + delta * 0.25) % 1.0;

        let height = (self.phase * TAU).sin() * 0.5;
        let scale = 1.0 + self.level;
        if let Some(body) = self.body {
            self.ctx.scene.modify(body, |object| {
                object.position[1] = height;
                object.scale = scale;
            });
        }
        let debug = self.ctx.container.debug();
        debug.add_text_category("Drone", "pitch", self.pitch);
        debug.add_text_category("Drone", "level", format!("{:.2}", self.level));
        let oscillator = self
            .sound
            .and_then(|sound| self.ctx.audio.sound_frequency(sound));
        if let Some(frequency) = oscillator {
            debug.add_text_category("Drone", "oscillator", frequency);
        }
    }
}

const PENTATONIC: [f32; 5] = [261.63, 293.66, 329.63, 392.0, 440.0];

/// Triangle tone stepping through a pentatonic scale, one bell per note.
pub struct Chimes {
    ctx: SimulationContext,
    bells: Vec<ObjectId>,
    sound: Option<SoundNode>,
    note: usize,
    timer: f32,
    interval: f32,
}

impl Chimes {
    pub fn new(ctx: SimulationContext) -> Result<Self> {
        Ok(Self {
            ctx,
            bells: Vec::new(),
            sound: None,
            note: 0,
            timer: 0.0,
            interval: 0.5,
        })
    }

    fn strike(&mut self) {
        self.note = (self.note + 1) % PENTATONIC.len();
        if let Some(sound) = self.sound {
            self.ctx.audio.set_sound_frequency(sound, PENTATONIC[self.note]);
        }
        for (index, bell) in self.bells.iter().enumerate() {
            let scale = if index == self.note { 1.5 } else { 1.0 };
            self.ctx.scene.modify(*bell, |object| object.scale = scale);
        }
    }
}

impl Simulation for Chimes {
    fn on_enter(&mut self) {
        self.ctx.camera.look_at([0.0, 0.0, 8.0], [0.0; 3]);
        let count = PENTATONIC.len();
        self.bells = (0..count)
            .map(|index| {
                let angle = index as f32 / count as f32 * TAU;
                let bell = SceneObject::new(format!("bell-{index}"), ObjectKind::Points)
                    .at([angle.cos() * 2.0, angle.sin() * 2.0, 0.0]);
                self.ctx.scene.add(bell)
            })
            .collect();
    }

    fn on_audio_start(&mut self, bus: ModuleBus) {
        self.sound = self.ctx.audio.create_sound_node(
            Waveform::Triangle,
            PENTATONIC[self.note],
            Some(bus),
        );
    }

    fn on_audio_stop(&mut self) {
        self.sound = None;
    }

    fn update(&mut self, delta: f32) {
        self.timer += delta;
        while self.timer >= self.interval {
            self.timer -= self.interval;
            self.strike();
        }
        self.ctx
            .container
            .debug()
            .add_text_category("Chimes", "note", PENTATONIC[self.note]);
    }

    fn dispose(&mut self) {
        self.bells.clear();
    }
}

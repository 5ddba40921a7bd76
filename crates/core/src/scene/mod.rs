use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectKind {
    Mesh,
    Points,
    Light,
    Group,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectId(u64);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub name: String,
    pub kind: ObjectKind,
    pub position: [f32; 3],
    pub scale: f32,
}

impl SceneObject {
    pub fn new(name: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            name: name.into(),
            kind,
            position: [0.0; 3],
            scale: 1.0,
        }
    }

    pub fn at(mut self, position: [f32; 3]) -> Self {
        self.position = position;
        self
    }
}

/// Shared scene the active simulation populates and the renderer draws.
///
/// The lifecycle manager clears it whenever a simulation is replaced.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    inner: Arc<Mutex<SceneState>>,
}

#[derive(Debug, Default)]
struct SceneState {
    next_id: u64,
    objects: Vec<(ObjectId, SceneObject)>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, object: SceneObject) -> ObjectId {
        let mut state = self.inner.lock();
        let id = ObjectId(state.next_id);
        state.next_id += 1;
        state.objects.push((id, object));
        id
    }

    /// Applies `edit` to the object if it is still in the scene.
    pub fn modify(&self, id: ObjectId, edit: impl FnOnce(&mut SceneObject)) -> bool {
        let mut state = self.inner.lock();
        match state.objects.iter_mut().find(|(existing, _)| *existing == id) {
            Some((_, object)) => {
                edit(object);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: ObjectId) -> Option<SceneObject> {
        let state = self.inner.lock();
        state
            .objects
            .iter()
            .find(|(existing, _)| *existing == id)
            .map(|(_, object)| object.clone())
    }

    pub fn remove(&self, id: ObjectId) -> Option<SceneObject> {
        let mut state = self.inner.lock();
        let index = state.objects.iter().position(|(existing, _)| *existing == id)?;
        Some(state.objects.remove(index).1)
    }

    /// Removes every object and returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut state = self.inner.lock();
        let count = state.objects.len();
        state.objects.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.inner.lock().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<SceneObject> {
        let state = self.inner.lock();
        state.objects.iter().map(|(_, object)| object.clone()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub position: [f32; 3],
    pub target: [f32; 3],
    pub fov_degrees: f32,
}

impl Default for CameraPose {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0, 5.0],
            target: [0.0; 3],
            fov_degrees: 60.0,
        }
    }
}

/// Shared camera handle.
#[derive(Debug, Clone, Default)]
pub struct Camera {
    pose: Arc<Mutex<CameraPose>>,
}

impl Camera {
    pub fn new(pose: CameraPose) -> Self {
        Self {
            pose: Arc::new(Mutex::new(pose)),
        }
    }

    pub fn pose(&self) -> CameraPose {
        *self.pose.lock()
    }

    pub fn set_pose(&self, pose: CameraPose) {
        *self.pose.lock() = pose;
    }

    pub fn look_at(&self, position: [f32; 3], target: [f32; 3]) {
        let mut pose = self.pose.lock();
        pose.position = position;
        pose.target = target;
    }
}

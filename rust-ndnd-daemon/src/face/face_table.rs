//! Face table: FaceId allocation and lookup.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use log::info;

use super::{Face, FaceId, RESERVED_FACE_ID_MAX};
use crate::signal::Signal;

pub struct FaceTable {
    faces: BTreeMap<FaceId, Rc<RefCell<Face>>>,
    next_id: FaceId,
    pub after_add: Signal<FaceId>,
    pub before_remove: Signal<FaceId>,
}

impl Default for FaceTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FaceTable {
    pub fn new() -> Self {
        Self {
            faces: BTreeMap::new(),
            next_id: RESERVED_FACE_ID_MAX + 1,
            after_add: Signal::new(),
            before_remove: Signal::new(),
        }
    }

    /// Adds a face under a freshly allocated id (256 upward).
    pub fn add(&mut self, mut face: Face) -> Rc<RefCell<Face>> {
        let id = self.next_id;
        self.next_id += 1;
        face.set_id(id);
        let face = Rc::new(RefCell::new(face));
        self.faces.insert(id, Rc::clone(&face));
        info!(
            "face table: add face {} remote={}",
            id,
            face.borrow().remote_uri()
        );
        self.after_add.emit(&id);
        face
    }

    /// Adds a face under a reserved id (1..=255).
    pub fn add_reserved(&mut self, mut face: Face, id: FaceId) -> Rc<RefCell<Face>> {
        assert!(
            (1..=RESERVED_FACE_ID_MAX).contains(&id),
            "reserved ids are 1..=255"
        );
        assert!(!self.faces.contains_key(&id), "face id already in use");
        face.set_id(id);
        let face = Rc::new(RefCell::new(face));
        self.faces.insert(id, Rc::clone(&face));
        self.after_add.emit(&id);
        face
    }

    /// `None` for an id that was never allocated or whose face is gone.
    pub fn get(&self, id: FaceId) -> Option<Rc<RefCell<Face>>> {
        self.faces.get(&id).cloned()
    }

    pub fn remove(&mut self, id: FaceId) -> Option<Rc<RefCell<Face>>> {
        if self.faces.contains_key(&id) {
            self.before_remove.emit(&id);
        }
        let face = self.faces.remove(&id);
        if let Some(face) = &face {
            info!("face table: remove face {}", id);
            face.borrow_mut().close();
        }
        face
    }

    pub fn size(&self) -> usize {
        self.faces.len()
    }

    pub fn ids(&self) -> Vec<FaceId> {
        self.faces.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FaceId, Rc<RefCell<Face>>)> + '_ {
        self.faces.iter().map(|(&id, face)| (id, Rc::clone(face)))
    }
}

//! Observer recording every event for assertions.

use std::sync::Mutex;

use sessionbox::{SessionError, SessionObserver};
use sessionbox_backend::ShardActivity;
use sessionbox_core::{SessionKey, SmolStr};

#[derive(Default)]
pub struct RecordingObserver {
    errors: Mutex<Vec<String>>,
    written: Mutex<Vec<(SessionKey, Vec<SmolStr>)>>,
    removed: Mutex<Vec<(SessionKey, Vec<SmolStr>)>>,
    loaded: Mutex<Vec<(SessionKey, usize)>>,
    activity: Mutex<Vec<Vec<ShardActivity>>>,
}

#[allow(dead_code)]
impl RecordingObserver {
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().expect("errors lock").clone()
    }

    pub fn written(&self) -> Vec<(SessionKey, Vec<SmolStr>)> {
        self.written.lock().expect("written lock").clone()
    }

    pub fn removed(&self) -> Vec<(SessionKey, Vec<SmolStr>)> {
        self.removed.lock().expect("removed lock").clone()
    }

    pub fn loaded(&self) -> Vec<(SessionKey, usize)> {
        self.loaded.lock().expect("loaded lock").clone()
    }

    pub fn activity(&self) -> Vec<Vec<ShardActivity>> {
        self.activity.lock().expect("activity lock").clone()
    }
}

impl SessionObserver for RecordingObserver {
    fn on_error(&self, error: &SessionError, _key: Option<&SessionKey>) {
        self.errors.lock().expect("errors lock").push(error.to_string());
    }

    fn on_fields_written(&self, key: &SessionKey, fields: &[(SmolStr, String)]) {
        let names = fields.iter().map(|(name, _)| name.clone()).collect();
        self.written
            .lock()
            .expect("written lock")
            .push((key.clone(), names));
    }

    fn on_fields_removed(&self, key: &SessionKey, fields: &[SmolStr]) {
        self.removed
            .lock()
            .expect("removed lock")
            .push((key.clone(), fields.to_vec()));
    }

    fn on_session_loaded(&self, key: &SessionKey, bytes: usize) {
        self.loaded
            .lock()
            .expect("loaded lock")
            .push((key.clone(), bytes));
    }

    fn on_connection_activity(&self, activity: &[ShardActivity]) {
        self.activity
            .lock()
            .expect("activity lock")
            .push(activity.to_vec());
    }
}

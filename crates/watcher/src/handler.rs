//! Event consumers

use dirwatch_core::ChangeEvent;

/// Receives batches of change events, one batch per path per tick
pub trait EventHandler {
    fn handle_events(&mut self, events: Vec<ChangeEvent>);
}

impl<F> EventHandler for F
where
    F: FnMut(Vec<ChangeEvent>),
{
    fn handle_events(&mut self, events: Vec<ChangeEvent>) {
        (self)(events)
    }
}

impl EventHandler for crossbeam_channel::Sender<ChangeEvent> {
    fn handle_events(&mut self, events: Vec<ChangeEvent>) {
        for event in events {
            // A dropped receiver only means nobody listens any more
            let _ = self.send(event);
        }
    }
}

impl EventHandler for std::sync::mpsc::Sender<ChangeEvent> {
    fn handle_events(&mut self, events: Vec<ChangeEvent>) {
        for event in events {
            let _ = self.send(event);
        }
    }
}

use std::time::Duration;

use crossterm::event::{
    Event as CrosstermEvent, EventStream, KeyEvent, KeyEventKind, MouseEvent, MouseEventKind,
};
use futures::{FutureExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Terminal events
#[derive(Clone, Debug)]
pub enum Event {
    /// Redraw tick, keeps the loading indicator and notices current
    Tick,
    Key(KeyEvent),
    /// Wheel scrolling over the feed
    Mouse(MouseEvent),
    Resize(u16, u16),
    /// Terminal input failed
    Error(String),
}

impl Event {
    /// Keep what the viewer reacts to. Key releases and mouse motion are dropped
    /// so they do not cost a redraw of the merged feed.
    fn from_crossterm(event: CrosstermEvent) -> Option<Self> {
        match event {
            CrosstermEvent::Key(key) if key.kind == KeyEventKind::Press => Some(Event::Key(key)),
            CrosstermEvent::Mouse(mouse)
                if matches!(
                    mouse.kind,
                    MouseEventKind::ScrollUp | MouseEventKind::ScrollDown
                ) =>
            {
                Some(Event::Mouse(mouse))
            }
            CrosstermEvent::Resize(w, h) => Some(Event::Resize(w, h)),
            _ => None,
        }
    }
}

/// Reads terminal input on a background task
pub struct EventHandler {
    receiver: mpsc::UnboundedReceiver<Event>,
    cancel: CancellationToken,
}

impl EventHandler {
    pub fn new(tick_rate: Duration) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        tokio::spawn(read_terminal(sender, cancel.clone(), tick_rate));

        Self { receiver, cancel }
    }

    pub async fn next(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }

    /// Stop the reader task
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

async fn read_terminal(
    sender: mpsc::UnboundedSender<Event>,
    cancel: CancellationToken,
    tick_rate: Duration,
) {
    let mut reader = EventStream::new();
    let mut ticks = tokio::time::interval(tick_rate);

    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticks.tick() => Some(Event::Tick),
            next = reader.next().fuse() => match next {
                Some(Ok(raw)) => Event::from_crossterm(raw),
                Some(Err(e)) => Some(Event::Error(e.to_string())),
                None => break,
            },
        };

        if let Some(event) = event {
            if sender.send(event).is_err() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crossterm::event::{KeyCode, KeyEventState, KeyModifiers};

    use super::*;

    fn key(kind: KeyEventKind) -> CrosstermEvent {
        CrosstermEvent::Key(KeyEvent {
            code: KeyCode::Char('g'),
            modifiers: KeyModifiers::NONE,
            kind,
            state: KeyEventState::NONE,
        })
    }

    fn mouse(kind: MouseEventKind) -> CrosstermEvent {
        CrosstermEvent::Mouse(MouseEvent {
            kind,
            column: 3,
            row: 4,
            modifiers: KeyModifiers::NONE,
        })
    }

    #[test]
    fn test_only_key_presses_pass() {
        assert!(matches!(
            Event::from_crossterm(key(KeyEventKind::Press)),
            Some(Event::Key(_))
        ));
        assert!(Event::from_crossterm(key(KeyEventKind::Release)).is_none());
    }

    #[test]
    fn test_only_wheel_mouse_events_pass() {
        assert!(matches!(
            Event::from_crossterm(mouse(MouseEventKind::ScrollDown)),
            Some(Event::Mouse(_))
        ));
        assert!(Event::from_crossterm(mouse(MouseEventKind::Moved)).is_none());
    }

    #[test]
    fn test_resize_passes() {
        assert!(matches!(
            Event::from_crossterm(CrosstermEvent::Resize(80, 24)),
            Some(Event::Resize(80, 24))
        ));
    }
}

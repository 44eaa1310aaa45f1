//! Single-threaded dispatch loop.
//!
//! Waits on three things at once: the shutdown future, the engine's earliest
//! timer deadline and the event channel. Each wake-up runs exactly one handler
//! to completion before the next wait, so engine state is never touched
//! concurrently and events are handled in arrival order.

use std::future::Future;
use std::time::Instant;

use crate::engine::Engine;
use crate::event_bus::EventReceiver;
use crate::output::OutputSink;
use crate::platform::ProcessHost;

/// Current time on the runtime clock (pausable in tests).
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}

/// Runs until `shutdown` completes or every event sender is dropped.
pub async fn run<O, P, F>(engine: &mut Engine<O, P>, events: &mut EventReceiver, shutdown: F)
where
    O: OutputSink,
    P: ProcessHost,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        let deadline = engine.next_deadline();
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                log::info!("reactor: shutdown requested");
                break;
            }
            _ = sleep_until(deadline) => engine.on_tick(now()),
            event = events.recv() => match event {
                Some(event) => engine.handle(event, now()),
                None => {
                    log::info!("reactor: event channel closed");
                    break;
                }
            },
        }
    }

    let pending = engine.scheduler().pending_runs();
    if pending > 0 {
        log::warn!("reactor: abandoning {pending} unfinished key sequence(s)");
    }
    for (pid, command) in engine.scheduler().live_commands() {
        log::info!("reactor: leaving `{command}` (pid {pid}) running");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::binding::{Action, BindingsBuilder, KeySignal, Keycode};
    use crate::engine::EngineSettings;
    use crate::event_bus::{self, InputEvent, ReactorEvent};
    use crate::platform::mock::{RecordingOutput, RecordingProcessHost};

    const A: Keycode = Keycode(30);
    const CTRL: Keycode = Keycode(29);
    const C: Keycode = Keycode(46);

    fn copy_engine(key_interval: Duration) -> Engine<RecordingOutput, RecordingProcessHost> {
        let mut builder = BindingsBuilder::new();
        builder
            .add_keybind(
                A,
                Vec::new(),
                Action::key_sequence(vec![
                    KeySignal::press(CTRL),
                    KeySignal::press(C),
                    KeySignal::release(C),
                    KeySignal::release(CTRL),
                ]),
                None,
            )
            .unwrap();
        Engine::new(
            builder.build(),
            EngineSettings { key_interval, swipe_threshold: 50.0 },
            RecordingOutput::default(),
            RecordingProcessHost::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn paced_sequence_completes_before_shutdown() {
        // Arrange
        let mut engine = copy_engine(Duration::from_millis(20));
        let (tx, mut rx) = event_bus::channel();
        tx.send(ReactorEvent::Input(InputEvent::Key { keycode: A, pressed: true }))
            .await
            .unwrap();

        // Act
        run(&mut engine, &mut rx, tokio::time::sleep(Duration::from_secs(1))).await;

        // Assert
        assert_eq!(engine.scheduler().output().emitted.len(), 4);
        assert_eq!(engine.scheduler().pending_runs(), 0);
        drop(tx);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_abandons_unfinished_sequence() {
        let mut engine = copy_engine(Duration::from_secs(10));
        let (tx, mut rx) = event_bus::channel();
        tx.send(ReactorEvent::Input(InputEvent::Key { keycode: A, pressed: true }))
            .await
            .unwrap();

        run(&mut engine, &mut rx, tokio::time::sleep(Duration::from_secs(15))).await;

        assert_eq!(engine.scheduler().output().emitted.len(), 2);
        assert_eq!(engine.scheduler().pending_runs(), 1);
        drop(tx);
    }

    #[tokio::test]
    async fn closed_channel_ends_loop() {
        let mut engine = copy_engine(Duration::ZERO);
        let (tx, mut rx) = event_bus::channel();
        tx.send(ReactorEvent::Input(InputEvent::Key { keycode: A, pressed: true }))
            .await
            .unwrap();
        drop(tx);

        run(&mut engine, &mut rx, std::future::pending()).await;

        assert_eq!(engine.scheduler().output().emitted.len(), 4);
    }
}

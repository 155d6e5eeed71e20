//! Integration tests for process-wide channel redirection
//!
//! These share the process's standard channels, so every test is serial.
//! They use the log channel where possible to keep the test harness output
//! readable.

use linetap::logging::{LogLevel, Logger};
use linetap::{channel, sink, Channel, LineRecorder, RedirectConfig, RedirectGuard, StreamObserver};
use serial_test::serial;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

#[test]
#[serial]
fn test_guard_controls_redirection_lifetime() {
    assert!(!channel::is_active(Channel::Log));
    {
        let _guard = RedirectGuard::acquire(Channel::Log).unwrap();
        assert!(channel::is_active(Channel::Log));

        let _second = RedirectGuard::acquire(Channel::Log).unwrap();
        assert!(channel::is_active(Channel::Log));
    }
    assert!(!channel::is_active(Channel::Log));
}

#[test]
#[serial]
fn test_guard_attach_receives_lines() {
    let recorder = Arc::new(LineRecorder::new());
    let guard = RedirectGuard::acquire(Channel::Log).unwrap();
    guard.attach(&recorder).unwrap();

    writeln!(sink::log().lock(), "via guard").unwrap();
    assert!(recorder.wait_for(1, WAIT));

    assert!(guard.detach(&recorder));
    drop(guard);
    assert_eq!(recorder.lines(), vec!["via guard"]);
    assert!(!channel::is_active(Channel::Log));
}

#[test]
#[serial]
fn test_first_attach_creates_last_detach_destroys() {
    let recorder = Arc::new(LineRecorder::new());
    channel::attach(Channel::Log, &recorder).unwrap();
    assert!(channel::is_active(Channel::Log));
    assert_eq!(channel::observer_count(Channel::Log), 1);

    sink::log().write_line("attached").unwrap();
    assert!(recorder.wait_for(1, WAIT));

    assert!(channel::detach(Channel::Log, &recorder));
    assert!(!channel::is_active(Channel::Log));
    assert!(!channel::detach(Channel::Log, &recorder));
}

#[test]
#[serial]
fn test_guard_keeps_channel_after_last_detach() {
    let recorder = Arc::new(LineRecorder::new());
    let guard = RedirectGuard::acquire(Channel::Log).unwrap();
    channel::attach(Channel::Log, &recorder).unwrap();

    channel::detach(Channel::Log, &recorder);
    assert!(channel::is_active(Channel::Log));

    drop(guard);
    assert!(!channel::is_active(Channel::Log));
}

#[test]
#[serial]
fn test_shutdown_delivers_pending_lines() {
    let recorder = Arc::new(LineRecorder::new());
    let _guard = RedirectGuard::acquire(Channel::Log).unwrap();
    channel::attach(Channel::Log, &recorder).unwrap();

    {
        let sink = sink::log();
        let mut log = sink.lock();
        for i in 0..100 {
            writeln!(log, "pending {i}").unwrap();
        }
    }
    channel::shutdown(Channel::Log);

    assert!(!channel::is_active(Channel::Log));
    assert_eq!(recorder.len(), 100);
    assert_eq!(recorder.lines()[99], "pending 99");
}

#[test]
#[serial]
fn test_observer_can_detach_itself_through_facade() {
    struct OneShot {
        me: Mutex<Option<Arc<OneShot>>>,
        seen: Mutex<Vec<String>>,
    }
    impl StreamObserver for OneShot {
        fn on_line(&self, line: &str) {
            self.seen.lock().unwrap().push(line.to_string());
            if let Some(me) = self.me.lock().unwrap().take() {
                channel::detach(Channel::Log, &me);
            }
        }
    }

    let one_shot = Arc::new(OneShot {
        me: Mutex::new(None),
        seen: Mutex::new(Vec::new()),
    });
    *one_shot.me.lock().unwrap() = Some(Arc::clone(&one_shot));
    let recorder = Arc::new(LineRecorder::new());

    let _guard = RedirectGuard::acquire(Channel::Log).unwrap();
    channel::attach(Channel::Log, &one_shot).unwrap();
    channel::attach(Channel::Log, &recorder).unwrap();

    sink::log().write_line("first").unwrap();
    sink::log().write_line("second").unwrap();
    assert!(recorder.wait_for(2, WAIT));
    channel::shutdown(Channel::Log);

    assert_eq!(*one_shot.seen.lock().unwrap(), vec!["first"]);
    assert_eq!(recorder.lines(), vec!["first", "second"]);
}

#[test]
#[serial]
fn test_last_observer_detaching_itself_releases_channel() {
    struct DetachOnFirstLine {
        me: Mutex<Option<Arc<DetachOnFirstLine>>>,
        detached: LineRecorder,
    }
    impl StreamObserver for DetachOnFirstLine {
        fn on_line(&self, line: &str) {
            let me = self.me.lock().unwrap().take();
            if let Some(me) = me {
                assert!(channel::detach(Channel::Log, &me));
                self.detached.on_line(line);
            }
        }
    }

    let observer = Arc::new(DetachOnFirstLine {
        me: Mutex::new(None),
        detached: LineRecorder::new(),
    });
    *observer.me.lock().unwrap() = Some(Arc::clone(&observer));

    channel::attach(Channel::Log, &observer).unwrap();
    sink::log().write_line("first").unwrap();
    assert!(observer.detached.wait_for(1, WAIT));
    assert!(!channel::is_active(Channel::Log));

    // The channel writes to its original target again and can be redirected anew.
    assert!(sink::log().write_line("after self-detach").is_ok());
    let recorder = Arc::new(LineRecorder::new());
    channel::attach(Channel::Log, &recorder).unwrap();
    sink::log().write_line("again").unwrap();
    assert!(recorder.wait_for(1, WAIT));
    assert!(channel::detach(Channel::Log, &recorder));
    assert_eq!(recorder.lines(), vec!["again"]);
}

#[test]
#[serial]
fn test_shutdown_from_observer_releases_channel() {
    let done = Arc::new(LineRecorder::new());
    let closer = {
        let done = Arc::clone(&done);
        Arc::new(move |line: &str| {
            channel::shutdown(Channel::Log);
            done.on_line(line);
        })
    };

    channel::attach(Channel::Log, &closer).unwrap();
    sink::log().write_line("close").unwrap();
    assert!(done.wait_for(1, WAIT));

    assert!(!channel::is_active(Channel::Log));
    assert!(sink::log().write_line("after shutdown").is_ok());
}

#[test]
#[serial]
fn test_default_config_applies_to_new_redirectors() {
    channel::set_default_config(RedirectConfig::default().with_flush_partial_on_shutdown(true));
    let recorder = Arc::new(LineRecorder::new());
    channel::attach(Channel::Log, &recorder).unwrap();

    write!(sink::log().lock(), "no terminator").unwrap();
    channel::shutdown(Channel::Log);
    channel::set_default_config(RedirectConfig::default());

    assert_eq!(recorder.lines(), vec!["no terminator"]);
}

#[test]
#[serial]
fn test_logger_output_is_observable_on_log_channel() {
    let recorder = Arc::new(LineRecorder::new());
    let _guard = RedirectGuard::acquire(Channel::Log).unwrap();
    channel::attach(Channel::Log, &recorder).unwrap();

    // Keep stdout out of the test output by giving the logger a silent console.
    let silent = Arc::new(linetap::StreamSink::new("silent", Box::new(std::io::sink())));
    let logger = Logger::new(Arc::clone(&silent), silent, sink::log());
    logger.log(LogLevel::Audit, "user login");
    channel::shutdown(Channel::Log);

    assert_eq!(recorder.lines(), vec!["[audit] user login"]);
}

#[test]
#[serial]
fn test_channel_names_parse() {
    assert_eq!("stdout".parse::<Channel>().unwrap(), Channel::Stdout);
    assert_eq!("ERR".parse::<Channel>().unwrap(), Channel::Stderr);
    assert_eq!(Channel::Log.to_string(), "log");
    assert!("tty".parse::<Channel>().is_err());
}

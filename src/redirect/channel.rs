//! Process-wide redirection of the standard channels
//!
//! Each [`Channel`] has at most one live [`Redirector`]. It is created by
//! the first [`RedirectGuard::acquire`] or [`attach`], and torn down when the
//! last guard is dropped with no observers left, when the last observer
//! detaches with no guard held, or on an explicit [`shutdown`].

use super::{sink, RedirectError, Redirector, Sink, StreamObserver};
use crate::config::RedirectConfig;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// A well-known output channel of the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Stdout,
    Stderr,
    Log,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Stdout, Channel::Stderr, Channel::Log];

    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Stdout => "stdout",
            Channel::Stderr => "stderr",
            Channel::Log => "log",
        }
    }

    /// The shared sink behind this channel
    pub fn sink(self) -> Arc<sink::StreamSink> {
        match self {
            Channel::Stdout => sink::stdout(),
            Channel::Stderr => sink::stderr(),
            Channel::Log => sink::log(),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stdout" | "out" => Ok(Channel::Stdout),
            "stderr" | "err" => Ok(Channel::Stderr),
            "log" => Ok(Channel::Log),
            other => Err(format!(
                "unknown channel '{other}' (expected stdout, stderr or log)"
            )),
        }
    }
}

#[derive(Default)]
struct Slot {
    redirector: Option<Redirector>,
    guards: usize,
}

#[derive(Default)]
struct ChannelTable {
    slots: HashMap<Channel, Slot>,
    config: RedirectConfig,
}

static TABLE: Lazy<Mutex<ChannelTable>> = Lazy::new(|| Mutex::new(ChannelTable::default()));

fn table() -> MutexGuard<'static, ChannelTable> {
    TABLE.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ChannelTable {
    fn ensure(&mut self, channel: Channel) -> Result<&mut Slot, RedirectError> {
        let config = self.config.clone();
        let slot = self.slots.entry(channel).or_default();
        if slot.redirector.is_none() {
            let sink: Arc<dyn Sink> = channel.sink();
            slot.redirector = Some(Redirector::start(sink, config)?);
            debug!(%channel, "channel redirector created");
        }
        Ok(slot)
    }

    /// Take the redirector out if nothing keeps it alive any more.
    fn release_if_idle(&mut self, channel: Channel) -> Option<Redirector> {
        let slot = self.slots.get_mut(&channel)?;
        let idle = slot.guards == 0
            && slot
                .redirector
                .as_ref()
                .is_some_and(|r| r.observer_count() == 0);
        if idle {
            slot.redirector.take()
        } else {
            None
        }
    }
}

// Dropping a redirector joins its monitor thread, which may itself be calling
// into this module from an observer. Always drop after releasing the table.
fn teardown(redirector: Option<Redirector>, channel: Channel) {
    if let Some(redirector) = redirector {
        drop(redirector);
        debug!(%channel, "channel redirector destroyed");
    }
}

/// Config used for redirectors this module creates from now on
pub fn set_default_config(config: RedirectConfig) {
    table().config = config;
}

/// Attach `observer` to `channel`, redirecting the channel if needed.
pub fn attach<O>(channel: Channel, observer: &Arc<O>) -> Result<(), RedirectError>
where
    O: StreamObserver + 'static,
{
    let mut table = table();
    let slot = table.ensure(channel)?;
    if let Some(redirector) = &slot.redirector {
        redirector.attach(observer);
    }
    Ok(())
}

/// Detach `observer` from `channel`. Returns whether it was attached.
pub fn detach<O>(channel: Channel, observer: &Arc<O>) -> bool
where
    O: StreamObserver + ?Sized,
{
    let (removed, released) = {
        let mut table = table();
        let removed = table
            .slots
            .get(&channel)
            .and_then(|slot| slot.redirector.as_ref())
            .map_or(0, |r| r.detach(observer));
        (removed, table.release_if_idle(channel))
    };
    teardown(released, channel);
    removed > 0
}

/// Stop redirecting `channel` now, whatever still references it.
pub fn shutdown(channel: Channel) {
    let released = table()
        .slots
        .get_mut(&channel)
        .and_then(|slot| slot.redirector.take());
    teardown(released, channel);
}

/// Stop redirecting every channel.
pub fn shutdown_all() {
    for channel in Channel::ALL {
        shutdown(channel);
    }
}

pub fn is_active(channel: Channel) -> bool {
    table()
        .slots
        .get(&channel)
        .is_some_and(|slot| slot.redirector.is_some())
}

/// Number of live observers on `channel`
pub fn observer_count(channel: Channel) -> usize {
    table()
        .slots
        .get(&channel)
        .and_then(|slot| slot.redirector.as_ref())
        .map_or(0, Redirector::observer_count)
}

/// Keeps a channel redirected for as long as it lives.
#[derive(Debug)]
#[must_use = "the channel stops being redirected when the guard is dropped"]
pub struct RedirectGuard {
    channel: Channel,
}

impl RedirectGuard {
    pub fn acquire(channel: Channel) -> Result<Self, RedirectError> {
        let mut table = table();
        let slot = table.ensure(channel)?;
        slot.guards += 1;
        Ok(Self { channel })
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn attach<O>(&self, observer: &Arc<O>) -> Result<(), RedirectError>
    where
        O: StreamObserver + 'static,
    {
        attach(self.channel, observer)
    }

    pub fn detach<O>(&self, observer: &Arc<O>) -> bool
    where
        O: StreamObserver + ?Sized,
    {
        detach(self.channel, observer)
    }
}

impl Drop for RedirectGuard {
    fn drop(&mut self) {
        let released = {
            let mut table = table();
            if let Some(slot) = table.slots.get_mut(&self.channel) {
                slot.guards = slot.guards.saturating_sub(1);
            }
            table.release_if_idle(self.channel)
        };
        teardown(released, self.channel);
    }
}

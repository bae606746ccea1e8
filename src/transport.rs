//! Surface transport seam.
//!
//! The engine only ever touches a surface through [`SurfacePort`] writes and
//! inbound [`SurfaceEvent`]s; what carries those values to a physical panel
//! is deployment plumbing outside this crate.

use std::sync::mpsc::Sender;

use log::info;

use crate::layout::{Channel, SignalKind};

/// A raw value reported by or written to a surface channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalValue {
    Bool(bool),
    U16(u16),
    Text(String),
}

impl SignalValue {
    pub fn kind(&self) -> SignalKind {
        match self {
            SignalValue::Bool(_) => SignalKind::Bool,
            SignalValue::U16(_) => SignalKind::U16,
            SignalValue::Text(_) => SignalKind::Text,
        }
    }
}

/// Inbound event from a surface, delivered serially into the dispatch loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceEvent {
    pub channel: Channel,
    pub value: SignalValue,
}

/// Outgoing channel writes for one surface. Writes are infallible at this
/// level; a transport that loses its device drops them.
pub trait SurfacePort {
    fn write_bool(&mut self, channel: Channel, value: bool);
    fn write_u16(&mut self, channel: Channel, value: u16);
    fn write_string(&mut self, channel: Channel, value: &str);
}

/// Port that logs every write, tagged with the surface name. Stands in for
/// the real transport in the demo binary.
pub struct LogPort {
    name: String,
}

impl LogPort {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl SurfacePort for LogPort {
    fn write_bool(&mut self, channel: Channel, value: bool) {
        info!("[SURFACE {}] bool {} = {}", self.name, channel, value);
    }

    fn write_u16(&mut self, channel: Channel, value: u16) {
        info!("[SURFACE {}] u16  {} = {}", self.name, channel, value);
    }

    fn write_string(&mut self, channel: Channel, value: &str) {
        info!("[SURFACE {}] text {} = {:?}", self.name, channel, value);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortWrite {
    Bool(Channel, bool),
    U16(Channel, u16),
    Text(Channel, String),
}

/// Port backed by an mpsc channel, for embedding a transport behind its own
/// service thread. A closed receiver means the surface went away, so send
/// errors are dropped.
pub struct ChannelPort {
    tx: Sender<PortWrite>,
}

impl ChannelPort {
    pub fn new(tx: Sender<PortWrite>) -> Self {
        Self { tx }
    }
}

impl SurfacePort for ChannelPort {
    fn write_bool(&mut self, channel: Channel, value: bool) {
        let _ = self.tx.send(PortWrite::Bool(channel, value));
    }

    fn write_u16(&mut self, channel: Channel, value: u16) {
        let _ = self.tx.send(PortWrite::U16(channel, value));
    }

    fn write_string(&mut self, channel: Channel, value: &str) {
        let _ = self.tx.send(PortWrite::Text(channel, value.to_string()));
    }
}

//! Real-time output-path core of a modular audio server: a cooperative
//! poll scheduler (`rtpoll`), the message-queue/clock machinery a
//! device thread runs on, and the PCM mixing kernels that back it,
//! illustrated end to end by a clocked null sink.

pub mod asyncmsgq;
pub mod clock;
pub mod error;
pub mod fdsem;
pub mod host;
pub mod kernels;
pub mod memory;
pub mod modargs;
pub mod null_sink;
pub mod rtpoll;
pub mod sample;
pub mod sink;

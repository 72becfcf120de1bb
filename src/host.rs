// Host-side module lifecycle — supplemented from the original source's
// module load/unload path (`pa__init`/`pa__done`), which the distilled
// spec only implies through "the null sink as illustration." `Host` is
// the minimal stand-in for the core: it owns loaded sinks by an opaque
// module id and tears them down in order on unload or on its own drop.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::DeviceError;
use crate::modargs::NullSinkArgs;
use crate::null_sink::NullSink;
use crate::sample::SampleSpec;

pub type ModuleId = u32;

/// Host-level defaults applied before a caller's own module arguments,
/// loaded from a real JSON document rather than parsed by hand: unlike
/// `modargs`'s flat `key=value` strings, this has actual structure
/// (nested per-device sections), so it goes through serde instead.
#[derive(Debug, Deserialize)]
pub struct HostDefaults {
    #[serde(default)]
    pub null_sink: Option<NullSinkDefaults>,
}

#[derive(Debug, Deserialize)]
pub struct NullSinkDefaults {
    pub format: Option<String>,
    pub channels: Option<u8>,
    pub rate: Option<u32>,
    pub latency_msec: Option<u64>,
}

impl HostDefaults {
    pub fn from_json(text: &str) -> Result<Self, DeviceError> {
        serde_json::from_str(text).map_err(|e| DeviceError::BadArgument {
            key: "host_defaults".to_string(),
            reason: e.to_string(),
        })
    }

    /// Apply these defaults on top of `args`, treating every field
    /// here as a fallback: an explicitly-set `args` value always wins.
    pub fn apply(&self, mut args: NullSinkArgs, explicit: &str) -> Result<NullSinkArgs, DeviceError> {
        let keys: std::collections::HashSet<&str> = explicit
            .split_whitespace()
            .filter_map(|pair| pair.split_once('=').map(|(key, _)| key))
            .collect();

        if let Some(defaults) = &self.null_sink {
            if !keys.contains("rate") {
                if let Some(rate) = defaults.rate {
                    args.rate = rate;
                }
            }
            if !keys.contains("channels") {
                if let Some(channels) = defaults.channels {
                    args.channels = channels;
                }
            }
            if !keys.contains("latency_msec") {
                if let Some(latency_msec) = defaults.latency_msec {
                    args.latency_msec = latency_msec;
                }
            }
            if !keys.contains("format") {
                if let Some(format) = &defaults.format {
                    args.format = crate::modargs::parse(&format!("format={format}"))?.format;
                }
            }
        }
        Ok(args)
    }
}

pub struct Host {
    next_id: ModuleId,
    sinks: HashMap<ModuleId, NullSink>,
}

impl Host {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            sinks: HashMap::new(),
        }
    }

    /// Load a null sink device thread with the given arguments and
    /// return the module id it was assigned.
    pub fn load_null_sink(&mut self, args: &NullSinkArgs) -> Result<ModuleId, DeviceError> {
        let spec = SampleSpec::new(args.format, args.channels, args.rate);
        let sink = NullSink::open(spec, args)?;
        let id = self.next_id;
        self.next_id += 1;
        self.sinks.insert(id, sink);
        Ok(id)
    }

    pub fn sink(&self, id: ModuleId) -> Option<&NullSink> {
        self.sinks.get(&id)
    }

    /// Unload a previously loaded module: shuts down its device thread
    /// and joins it before returning. Dropping the returned `NullSink`
    /// does the actual shutdown/join work.
    pub fn unload_module(&mut self, id: ModuleId) -> Result<(), DeviceError> {
        self.sinks
            .remove(&id)
            .ok_or_else(|| DeviceError::BadArgument {
                key: "module_id".to_string(),
                reason: format!("no loaded module with id {id}"),
            })?;
        Ok(())
    }

    pub fn loaded_module_ids(&self) -> Vec<ModuleId> {
        let mut ids: Vec<ModuleId> = self.sinks.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_defaults_parses_nested_json() {
        let json = r#"{"null_sink": {"format": "float32ne", "channels": 4, "rate": 48000, "latency_msec": 10}}"#;
        let defaults = HostDefaults::from_json(json).unwrap();
        let sink_defaults = defaults.null_sink.unwrap();
        assert_eq!(sink_defaults.channels, Some(4));
        assert_eq!(sink_defaults.rate, Some(48000));
    }

    #[test]
    fn host_defaults_apply_does_not_override_explicit_args() {
        let json = r#"{"null_sink": {"format": null, "channels": 4, "rate": 48000, "latency_msec": 10}}"#;
        let defaults = HostDefaults::from_json(json).unwrap();
        let args = crate::modargs::parse("rate=96000").unwrap();
        let applied = defaults.apply(args, "rate=96000").unwrap();
        assert_eq!(applied.rate, 96_000);
        assert_eq!(applied.channels, 4);
    }

    #[test]
    fn host_defaults_rejects_malformed_json() {
        assert!(HostDefaults::from_json("not json").is_err());
    }

    #[test]
    fn load_then_unload_roundtrips_module_id() {
        let mut host = Host::new();
        let id = host.load_null_sink(&NullSinkArgs::default()).unwrap();
        assert!(host.sink(id).is_some());
        host.unload_module(id).unwrap();
        assert!(host.sink(id).is_none());
    }

    #[test]
    fn unloading_unknown_module_id_errors() {
        let mut host = Host::new();
        assert!(host.unload_module(999).is_err());
    }

    #[test]
    fn loaded_module_ids_are_sorted() {
        let mut host = Host::new();
        let a = host.load_null_sink(&NullSinkArgs::default()).unwrap();
        let b = host.load_null_sink(&NullSinkArgs::default()).unwrap();
        let mut expected = vec![a, b];
        expected.sort_unstable();
        assert_eq!(host.loaded_module_ids(), expected);
    }
}

// Module argument parsing — ambient configuration. PulseAudio module
// arguments are a flat `key=value key2=value2` string; there's no
// nesting and no need for a real parser, so this stays hand-rolled.
// Anything with actual structure (the host-level defaults document)
// goes through serde instead — see `host::HostDefaults`.

use crate::error::DeviceError;
use crate::sample::SampleFormat;

#[derive(Debug, Clone)]
pub struct NullSinkArgs {
    pub sink_name: String,
    pub format: SampleFormat,
    pub channels: u8,
    pub rate: u32,
    pub latency_msec: u64,
    /// Per-channel position names, e.g. `["front-left", "front-right"]`.
    /// `None` means "use the default map for `channels`".
    pub channel_map: Option<Vec<String>>,
    pub description: String,
}

impl Default for NullSinkArgs {
    fn default() -> Self {
        Self {
            sink_name: "null".to_string(),
            format: SampleFormat::S16Ne,
            channels: 2,
            rate: 44100,
            latency_msec: 25,
            channel_map: None,
            description: "Null Output".to_string(),
        }
    }
}

/// Parse a `key=value key2=value2` argument string, applying each
/// recognized key on top of the defaults. Unknown keys are rejected
/// rather than silently ignored, matching module-args's own strictness.
pub fn parse(args: &str) -> Result<NullSinkArgs, DeviceError> {
    let mut parsed = NullSinkArgs::default();

    for pair in args.split_whitespace() {
        let (key, value) = pair.split_once('=').ok_or_else(|| DeviceError::BadArgument {
            key: pair.to_string(),
            reason: "expected key=value".to_string(),
        })?;

        match key {
            "sink_name" => parsed.sink_name = value.to_string(),
            "format" => parsed.format = parse_format(value)?,
            "channels" => {
                parsed.channels = value.parse().map_err(|_| DeviceError::BadArgument {
                    key: key.to_string(),
                    reason: format!("{value:?} is not a valid channel count"),
                })?
            }
            "rate" => {
                parsed.rate = value.parse().map_err(|_| DeviceError::BadArgument {
                    key: key.to_string(),
                    reason: format!("{value:?} is not a valid sample rate"),
                })?
            }
            "latency_msec" => {
                parsed.latency_msec = value.parse().map_err(|_| DeviceError::BadArgument {
                    key: key.to_string(),
                    reason: format!("{value:?} is not a valid latency"),
                })?
            }
            "channel_map" => {
                let names: Vec<String> = value.split(',').map(str::to_string).collect();
                parsed.channel_map = Some(names);
            }
            "description" => parsed.description = value.to_string(),
            other => {
                return Err(DeviceError::BadArgument {
                    key: other.to_string(),
                    reason: "unrecognized module argument".to_string(),
                })
            }
        }
    }

    if let Some(map) = &parsed.channel_map {
        if map.len() != parsed.channels as usize {
            return Err(DeviceError::BadArgument {
                key: "channel_map".to_string(),
                reason: format!(
                    "{} channel name(s) given for a {}-channel sink",
                    map.len(),
                    parsed.channels
                ),
            });
        }
    }

    Ok(parsed)
}

fn parse_format(value: &str) -> Result<SampleFormat, DeviceError> {
    Ok(match value {
        "u8" => SampleFormat::U8,
        "s16le" => SampleFormat::S16Le,
        "s16be" => SampleFormat::S16Be,
        "s16ne" => SampleFormat::S16Ne,
        "float32ne" => SampleFormat::Float32Ne,
        "alaw" => SampleFormat::ALaw,
        "ulaw" => SampleFormat::ULaw,
        other => {
            return Err(DeviceError::BadArgument {
                key: "format".to_string(),
                reason: format!("unknown sample format {other:?}"),
            })
        }
    })
}

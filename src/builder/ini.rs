//! Loading sender settings from an INI section.
//!
//! ```ini
//! [fluent]
//! tag = app.web
//! host = collector.internal
//! port = 24224
//! timeout = 3.0
//! buffer_limit = 8388608
//! overflow_policy = drop_oldest
//! ```
//!
//! Durations (`timeout`, `connect_timeout`, `write_timeout`,
//! `close_timeout`, `warn_interval`) are seconds and may be fractional.
//! Unknown keys are ignored.

use std::{fmt::Display, fs, path::Path, str::FromStr, time::Duration};

use ini::{Ini, Properties};

use crate::sender::OverflowPolicy;

use super::{BackoffOverrides, SenderBuildError, SenderBuilder};

fn parse_key<T>(props: &Properties, key: &str) -> Result<Option<T>, SenderBuildError>
where
    T: FromStr,
    T::Err: Display,
{
    props
        .get(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|err| SenderBuildError::Ini(format!("invalid value for '{key}': {err}")))
        })
        .transpose()
}

fn parse_seconds(props: &Properties, key: &str) -> Result<Option<Duration>, SenderBuildError> {
    let Some(seconds) = parse_key::<f64>(props, key)? else {
        return Ok(None);
    };
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(SenderBuildError::InvalidConfig(format!(
            "{key} must be a positive number of seconds"
        )));
    }
    Duration::try_from_secs_f64(seconds)
        .map(Some)
        .map_err(|err| SenderBuildError::InvalidConfig(format!("{key} is out of range: {err}")))
}

fn parse_seconds_ms(props: &Properties, key: &str) -> Result<Option<u64>, SenderBuildError> {
    Ok(parse_seconds(props, key)?
        .map(|duration| duration.as_millis().min(u128::from(u64::MAX)) as u64))
}

impl SenderBuilder {
    /// Read the builder settings from `section` of the INI file at `path`.
    pub fn from_ini_file(path: impl AsRef<Path>, section: &str) -> Result<Self, SenderBuildError> {
        let text = fs::read_to_string(path)?;
        Self::from_ini_str(&text, section)
    }

    /// Read the builder settings from `section` of INI text.
    pub fn from_ini_str(text: &str, section: &str) -> Result<Self, SenderBuildError> {
        let ini = Ini::load_from_str(text).map_err(|err| SenderBuildError::Ini(err.to_string()))?;
        let props = ini
            .section(Some(section))
            .ok_or_else(|| SenderBuildError::Ini(format!("missing section [{section}]")))?;
        let tag = props
            .get("tag")
            .ok_or_else(|| SenderBuildError::Ini(format!("section [{section}] has no 'tag'")))?;

        let mut builder = SenderBuilder::new(tag.trim());
        builder = Self::apply_transport(builder, props)?;

        if let Some(ms) = parse_seconds_ms(props, "timeout")? {
            builder = builder.with_connect_timeout_ms(ms).with_write_timeout_ms(ms);
        }
        if let Some(ms) = parse_seconds_ms(props, "connect_timeout")? {
            builder = builder.with_connect_timeout_ms(ms);
        }
        if let Some(ms) = parse_seconds_ms(props, "write_timeout")? {
            builder = builder.with_write_timeout_ms(ms);
        }
        if let Some(ms) = parse_seconds_ms(props, "close_timeout")? {
            builder = builder.with_close_timeout_ms(ms);
        }
        if let Some(interval) = parse_seconds(props, "warn_interval")? {
            builder = builder.with_warn_interval(interval);
        }
        if let Some(limit) = parse_key::<usize>(props, "buffer_limit")? {
            builder = builder.with_buffer_limit(limit);
        }
        if let Some(policy) = parse_key::<OverflowPolicy>(props, "overflow_policy")? {
            builder = builder.with_overflow_policy(policy);
        }
        if let Some(capacity) = parse_key::<usize>(props, "capacity")? {
            builder = builder.with_capacity(capacity);
        }

        let base_ms = parse_key::<u64>(props, "backoff_base_ms")?;
        let cap_ms = parse_key::<u64>(props, "backoff_cap_ms")?;
        if base_ms.is_some() || cap_ms.is_some() {
            let mut overrides = BackoffOverrides::new();
            if let Some(base) = base_ms {
                overrides = overrides.with_base_ms(base);
            }
            if let Some(cap) = cap_ms {
                overrides = overrides.with_cap_ms(cap);
            }
            builder = builder.with_backoff(overrides);
        }
        Ok(builder)
    }

    fn apply_transport(
        mut builder: SenderBuilder,
        props: &Properties,
    ) -> Result<SenderBuilder, SenderBuildError> {
        if let Some(path) = props.get("unix_path") {
            if props.contains_key("host") || props.contains_key("port") {
                return Err(SenderBuildError::Ini(
                    "unix_path cannot be combined with host or port".into(),
                ));
            }
            builder = builder.with_unix_path(path.trim());
        } else if props.contains_key("host") || props.contains_key("port") {
            let host = props.get("host").map_or(super::DEFAULT_HOST, str::trim);
            let port = parse_key::<u16>(props, "port")?.unwrap_or(super::DEFAULT_PORT);
            builder = builder.with_tcp(host, port);
        }

        let domain = props.get("tls_domain").map(|d| d.trim().to_owned());
        let insecure = parse_key::<bool>(props, "tls_insecure")?.unwrap_or(false);
        if domain.is_some() || props.contains_key("tls_insecure") {
            builder = builder.with_tls(domain, insecure);
        }
        Ok(builder)
    }
}

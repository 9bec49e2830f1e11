use anyhow::Result;
use serde_derive::Deserialize;

/// Frame size the client offers in the connection tune before the server
/// caps it.
pub const MAX_FRAME_SIZE: u32 = 131_072;
/// Channel cap the client offers in the connection tune.
pub const MAX_CHANNELS_PER_CONNECTION: u16 = 2047;

/// Settings of a connection: virtual host, credentials and the limits the
/// client offers during the tune negotiation.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ConnectionOptions {
    pub virtual_host: String,
    pub username: String,
    pub password: String,
    pub heartbeat: u16,
    pub channel_max: u16,
    pub frame_max: u32,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            virtual_host: "/".to_string(),
            username: "guest".to_string(),
            password: "guest".to_string(),
            heartbeat: 60,
            channel_max: MAX_CHANNELS_PER_CONNECTION,
            frame_max: MAX_FRAME_SIZE,
        }
    }
}

impl ConnectionOptions {
    pub fn virtual_host(mut self, virtual_host: &str) -> Self {
        self.virtual_host = virtual_host.to_string();
        self
    }

    pub fn credentials(mut self, username: &str, password: &str) -> Self {
        self.username = username.to_string();
        self.password = password.to_string();
        self
    }

    pub fn heartbeat(mut self, heartbeat: u16) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    pub fn channel_max(mut self, channel_max: u16) -> Self {
        self.channel_max = channel_max;
        self
    }

    pub fn frame_max(mut self, frame_max: u32) -> Self {
        self.frame_max = frame_max;
        self
    }
}

/// Load connection options from a TOML file.
pub fn parse_options(path: &str) -> Result<ConnectionOptions> {
    let cfg = std::fs::read_to_string(path)?;

    Ok(toml::from_str(&cfg)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_from_toml_fill_defaults() {
        let opts: ConnectionOptions = toml::from_str(
            r#"
            virtual_host = "/prod"
            username = "svc"
            password = "secret"
            "#,
        )
        .unwrap();

        assert_eq!("/prod", opts.virtual_host);
        assert_eq!("svc", opts.username);
        assert_eq!(MAX_FRAME_SIZE, opts.frame_max);
        assert_eq!(60, opts.heartbeat);
    }
}

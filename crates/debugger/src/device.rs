use async_trait::async_trait;
use eyre::WrapErr;

/// Port of the device's HTTP control protocol.
pub const ECP_PORT: u16 = 8060;

/// Remote control of the device outside the debugger console.
#[async_trait]
pub trait DeviceControl: Send + Sync + std::fmt::Debug {
    /// Return the device to its home screen, ending any running channel.
    async fn press_home_button(&self, host: &str) -> eyre::Result<()>;
}

/// [`DeviceControl`] over ECP.
#[derive(Debug, Clone, Default)]
pub struct EcpDeviceControl {
    client: reqwest::Client,
}

impl EcpDeviceControl {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DeviceControl for EcpDeviceControl {
    #[tracing::instrument(skip(self))]
    async fn press_home_button(&self, host: &str) -> eyre::Result<()> {
        let url = format!("http://{host}:{ECP_PORT}/keypress/Home");
        self.client
            .post(&url)
            .send()
            .await
            .wrap_err_with(|| format!("sending keypress to {url}"))?
            .error_for_status()
            .wrap_err("device rejected the keypress")?;
        tracing::debug!("pressed home");
        Ok(())
    }
}

use crate::error::InitError;
use crate::formatter::{FluentdFormatter, FormatterConfig};
use crate::layer::FluentdLayer;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Configuration of the fluentd layer.
///
/// **Fields**
/// - `timestamp_format`: chrono strftime pattern for the `time` key;
///   `None` renders RFC 3339.
/// - `max_level`: most verbose level that still gets written.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub timestamp_format: Option<String>,
    pub max_level: tracing::Level,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            timestamp_format: None,
            max_level: tracing::Level::TRACE,
        }
    }
}

impl LayerConfig {
    /// Build the layer described by this config on top of `make_writer`.
    ///
    /// **Returns**
    /// - `Err(InitError::Config(..))` if the timestamp pattern is invalid.
    pub fn build<W>(&self, make_writer: W) -> Result<FluentdLayer<W>, InitError>
    where
        W: for<'w> MakeWriter<'w> + 'static,
    {
        let formatter = FluentdFormatter::new(FormatterConfig {
            timestamp_format: self.timestamp_format.clone(),
        })?;
        Ok(FluentdLayer::with_formatter(make_writer, formatter).with_max_level(self.max_level))
    }
}

/// Install a global `tracing` subscriber that writes fluentd JSON lines to
/// `make_writer`.
///
/// **Parameters**
/// - `make_writer`: destination of the formatted lines (stdout, a file, a
///   test buffer).
/// - `config`: [`LayerConfig`] controlling timestamp rendering and level
///   filtering.
///
/// **Effects**
///
/// Installs a [`Registry`] combined with [`FluentdLayer`] as the global
/// default subscriber. Fails if the config is invalid or a global
/// subscriber is already set.
pub fn init_tracing_with_config<W>(make_writer: W, config: LayerConfig) -> Result<(), InitError>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = config.build(make_writer)?;
    let subscriber = Registry::default().with(layer);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Initialize tracing with sensible defaults.
///
/// Equivalent to calling [`init_tracing_with_config`] with stdout and
/// [`LayerConfig::default`]: every event, RFC 3339 timestamps.
pub fn init_tracing() -> Result<(), InitError> {
    init_tracing_with_config(std::io::stdout, LayerConfig::default())
}

use std::sync::Arc;

use argh::FromArgs;
use tracing::info;
use translate_pipeline::handler::SchemeHandler;
use translate_pipeline::options::OptionsMonitor;
use translate_pipeline::{TranslateMiddleware, TranslateService};

use crate::configuration::{self, Configuration};

mod basic_scheme;
mod error;
mod http_server;
mod listener;

pub use basic_scheme::{BasicIdentities, BasicScheme, BasicSchemeOptions};
pub use error::Error;
pub use http_server::serve_request;
use listener::Listener;

#[derive(FromArgs, PartialEq, Debug)]
#[argh(
    subcommand,
    name = "serve",
    description = "Run the translate gateway listener"
)]
pub struct Options {}

/// State shared by every connection of a listener.
pub struct ServerContext {
    pub service: Arc<TranslateService>,
    pub middleware: TranslateMiddleware,
    pub path_base: String,
}

impl ServerContext {
    pub fn new(config: &Configuration) -> Result<Self, configuration::Error> {
        let service = Arc::new(build_service(config)?);
        Ok(Self {
            middleware: TranslateMiddleware::new(Arc::clone(&service)),
            service,
            path_base: config.server.path_base.clone(),
        })
    }
}

/// Registers one basic scheme per `[basic.<name>]` section on top of the `[translate]` defaults.
pub fn build_service(config: &Configuration) -> Result<TranslateService, configuration::Error> {
    let mut options = config.translate.to_options()?;

    for (name, basic) in &config.basic {
        let mut monitor = OptionsMonitor::new();
        monitor.configure(name, BasicSchemeOptions::from(basic));
        let monitor = Arc::new(monitor);
        let identities = Arc::new(BasicIdentities::new(&basic.identity));

        info!("Registering basic scheme '{name}'");
        options.add_handler(name, basic.display_name.as_deref(), move || {
            SchemeHandler::new(BasicScheme::new(Arc::clone(&identities)), Arc::clone(&monitor))
        })?;
    }

    Ok(TranslateService::new(&options)?)
}

pub struct Command {
    listener: Listener,
}

impl Command {
    pub fn new(config: &Configuration) -> Result<Command, configuration::Error> {
        let context = ServerContext::new(config)?;
        Ok(Command {
            listener: Listener::new(&config.server, context),
        })
    }

    pub async fn run(&self) -> Result<(), Error> {
        self.listener.serve().await
    }
}

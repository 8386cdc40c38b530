mod run;

use crate::{certs::CertificatePaths, client::ServerAddress};

/// Action enum representing each possible command
#[derive(Debug)]
pub enum Action {
    Run {
        address: ServerAddress,
        certs: CertificatePaths,
        wait: bool,
    },
}

impl Action {
    /// Execute the action
    ///
    /// # Errors
    ///
    /// Returns an error if the action fails to execute
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}

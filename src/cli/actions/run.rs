use super::Action;
use crate::demo::{Demo, wait_for_enter};
use tokio::io::{BufReader, stdin};
use tracing::info;

/// Execute the action's business logic by delegating to the appropriate module
pub async fn execute(action: Action) -> anyhow::Result<()> {
    match action {
        Action::Run {
            address,
            certs,
            wait,
        } => {
            info!(
                server = %address,
                ca_file = %certs.ca_file.display(),
                client_cert_file = %certs.client_cert_file.display(),
                "starting connection attempts"
            );
            certs.warn_missing();

            let mut stdout = std::io::stdout();
            Demo::new(address, certs).run(&mut stdout).await?;

            if wait {
                wait_for_enter(&mut stdout, &mut BufReader::new(stdin())).await?;
            }

            Ok(())
        }
    }
}

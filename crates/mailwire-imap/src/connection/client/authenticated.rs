//! Implementation for the authenticated state.

use tracing::debug;

use super::Client;
use super::states::{Authenticated, Selected};
use crate::command::Command;
use crate::connection::stream::Transport;
use crate::decode::{FolderInfo, SelectMetadata, parse_folder_listing, parse_select_metadata};
use crate::types::{Capability, Mailbox};
use crate::Result;

impl<S> Client<S, Authenticated>
where
    S: Transport,
{
    /// Selects a mailbox for read-write access.
    ///
    /// Consumes self and returns a selected client on success.
    pub async fn select(self, mailbox: &str) -> Result<(Client<S, Selected>, SelectMetadata)> {
        self.open(mailbox, false).await
    }

    /// Examines a mailbox for read-only access.
    ///
    /// Consumes self and returns a selected client on success.
    pub async fn examine(self, mailbox: &str) -> Result<(Client<S, Selected>, SelectMetadata)> {
        self.open(mailbox, true).await
    }

    async fn open(
        mut self,
        mailbox: &str,
        read_only: bool,
    ) -> Result<(Client<S, Selected>, SelectMetadata)> {
        let mailbox = Mailbox::new(mailbox);
        let command = if read_only {
            Command::Examine {
                mailbox: mailbox.clone(),
            }
        } else {
            Command::Select {
                mailbox: mailbox.clone(),
            }
        };

        let responses = self.execute(&command).await?;
        let metadata = parse_select_metadata(&responses);
        debug!(
            %mailbox,
            uid_validity = metadata.uid_validity,
            exists = metadata.message_count,
            "mailbox opened"
        );

        let selected = Selected {
            mailbox,
            read_only,
            metadata: metadata.clone(),
        };
        Ok((self.into_state(selected), metadata))
    }

    /// Lists mailboxes matching a pattern.
    ///
    /// Uses XLIST on servers that offer it without SPECIAL-USE, so role
    /// attributes are still reported. Rows that do not decode are skipped.
    pub async fn list(&mut self, reference: &str, pattern: &str) -> Result<Vec<FolderInfo>> {
        let (reference, pattern) = (reference.to_string(), pattern.to_string());
        let command = if self.has_capability(&Capability::XList)
            && !self.has_capability(&Capability::SpecialUse)
        {
            Command::Xlist { reference, pattern }
        } else {
            Command::List { reference, pattern }
        };

        let responses = self.execute(&command).await?;
        Ok(responses
            .iter()
            .filter_map(|raw| parse_folder_listing(raw))
            .collect())
    }
}

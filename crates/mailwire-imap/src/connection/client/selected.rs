//! Implementation for the selected state.

use super::Client;
use super::states::{Authenticated, Selected};
use crate::Result;
use crate::command::{Command, FetchAttribute, SearchCriteria, UidSet};
use crate::connection::stream::Transport;
use crate::decode::{
    EmailBodyRecord, EmailHeaderRecord, SelectMetadata, decode_body_record,
    extract_body_parts_by_section, parse_body_structure, parse_header_records, parse_search_uids,
};
use crate::types::Mailbox;

impl<S> Client<S, Selected>
where
    S: Transport,
{
    /// Returns the selected mailbox.
    #[must_use]
    pub const fn mailbox(&self) -> &Mailbox {
        self.state.mailbox()
    }

    /// Returns what SELECT or EXAMINE reported.
    #[must_use]
    pub const fn metadata(&self) -> &SelectMetadata {
        self.state.metadata()
    }

    /// Returns true if the mailbox was opened with EXAMINE.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        self.state.is_read_only()
    }

    /// Closes the current mailbox and returns to the authenticated state.
    pub async fn close(mut self) -> Result<Client<S, Authenticated>> {
        self.execute(&Command::Close).await?;
        Ok(self.into_state(Authenticated))
    }

    /// Switches to another mailbox.
    pub async fn select(self, mailbox: &str) -> Result<(Self, SelectMetadata)> {
        self.into_state(Authenticated).select(mailbox).await
    }

    /// Returns the UIDs matching `criteria`.
    pub async fn uid_search(&mut self, criteria: SearchCriteria) -> Result<Vec<u32>> {
        let responses = self.execute(&Command::UidSearch { criteria }).await?;
        Ok(parse_search_uids(&responses))
    }

    /// Runs UID FETCH and returns the untagged responses undecoded.
    pub async fn uid_fetch(
        &mut self,
        uids: UidSet,
        items: Vec<FetchAttribute>,
    ) -> Result<Vec<Vec<u8>>> {
        let mut responses = self.execute(&Command::UidFetch { uids, items }).await?;
        // Last entry is the tagged completion.
        responses.pop();
        Ok(responses)
    }

    /// Fetches and decodes header records for the given UIDs.
    pub async fn fetch_headers(&mut self, uids: UidSet) -> Result<Vec<EmailHeaderRecord>> {
        let responses = self
            .uid_fetch(
                uids,
                vec![
                    FetchAttribute::Uid,
                    FetchAttribute::Flags,
                    FetchAttribute::InternalDate,
                    FetchAttribute::Rfc822Size,
                    FetchAttribute::header_fields(),
                ],
            )
            .await?;
        Ok(parse_header_records(&responses))
    }

    /// Fetches one message's structure and text parts and decodes them.
    ///
    /// Attachment payloads are listed but not downloaded.
    pub async fn fetch_body(&mut self, uid: u32) -> Result<EmailBodyRecord> {
        let structure = self
            .uid_fetch(UidSet::single(uid), vec![FetchAttribute::BodyStructure])
            .await?;
        let parts = structure
            .iter()
            .map(|raw| parse_body_structure(raw))
            .find(|parts| !parts.is_empty())
            .unwrap_or_default();

        let text_sections: Vec<FetchAttribute> = parts
            .iter()
            .filter(|p| !p.is_attachment && p.mime_type.starts_with("text/"))
            .map(|p| FetchAttribute::BodyPeek(p.part_id.clone()))
            .collect();

        let mut sections = std::collections::BTreeMap::new();
        if !text_sections.is_empty() {
            let bodies = self.uid_fetch(UidSet::single(uid), text_sections).await?;
            for raw in &bodies {
                sections.extend(extract_body_parts_by_section(raw));
            }
        }

        Ok(decode_body_record(uid, &parts, &sections))
    }
}

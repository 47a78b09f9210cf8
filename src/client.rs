use std::sync::Arc;

use chrono::NaiveDate;
use reqwest::{header::CONTENT_TYPE, Client, RequestBuilder, StatusCode};
use thiserror::Error;
use url::{Host, Url};

use crate::{
    clock::{Clock, SystemClock},
    config::{AdminSession, ConfigError, DirectoryConfig},
    lifecycle::{self, ValidationError},
    member::{Member, MemberId, MemberSnapshot, MemberUpdate, MembershipType, NewMember},
    wire::{self, AdminAction, AdminRequest, Reply},
};

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("System not configured: no directory endpoint has been set")]
    NotConfigured,

    #[error("{0}")]
    NotFound(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Could not reach the directory: {0}")]
    Network(#[source] reqwest::Error),

    #[error("The directory did not answer in time")]
    Timeout,

    #[error("Unexpected reply from the directory: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    Rejected(String),
}

impl From<reqwest::Error> for DirectoryError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DirectoryError::Timeout
        } else {
            DirectoryError::Network(err)
        }
    }
}

impl DirectoryError {
    /// Maps the free-text `error` of a failed reply onto an error kind.
    /// Only an add can conflict with an existing record.
    fn from_message(action: &str, message: String) -> Self {
        let lowered = message.to_lowercase();
        let says = |needles: &[&str]| needles.iter().any(|n| lowered.contains(n));

        if says(&["not found", "not exist", "doesn't exist", "no such"]) {
            DirectoryError::NotFound(message)
        } else if says(&["password", "unauthori"]) {
            DirectoryError::Auth(message)
        } else if action == wire::ACTION_ADD && says(&["exist", "duplicate"]) {
            DirectoryError::Conflict(message)
        } else {
            DirectoryError::Rejected(message)
        }
    }
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Outcome of a successful renewal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Renewal {
    pub member_id: MemberId,
    pub membership_type: MembershipType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Talks to the spreadsheet-backed member directory.
///
/// Lookups are public. Everything else needs a session that went through
/// [`DirectoryClient::verify_credential`]; without one the call fails with
/// [`DirectoryError::Auth`] before anything is sent. The password gate is
/// enforced by the directory, which is trusted to reject bad credentials.
#[derive(Debug)]
pub struct DirectoryClient {
    http: Client,
    config: DirectoryConfig,
    session: AdminSession,
    clock: Arc<dyn Clock>,
}

impl DirectoryClient {
    pub fn new(config: DirectoryConfig) -> DirectoryResult<Self> {
        let http = build_http(&config)?;

        Ok(Self {
            http,
            config,
            session: AdminSession::new(),
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    pub fn session(&self) -> &AdminSession {
        &self.session
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Points the client at a different endpoint. The admin session is
    /// dropped because the password belonged to the old directory.
    pub fn set_endpoint<S>(&mut self, raw: S) -> DirectoryResult<()>
    where
        S: AsRef<str>,
    {
        self.config.set_endpoint(raw)?;
        self.http = build_http(&self.config)?;
        self.session.logout();
        Ok(())
    }

    /// Finds a member by exact id. Needs no credential.
    pub async fn lookup(&self, id: &MemberId) -> DirectoryResult<MemberSnapshot> {
        let reply = self.get(wire::ACTION_LOOKUP, &[("id", id.as_str())]).await?;
        let reply = ensure_success(reply, wire::ACTION_LOOKUP, "Member not found")?;

        let row = reply
            .member
            .ok_or_else(|| DirectoryError::NotFound("Member not found".to_string()))?;
        let member: Member = serde_json::from_value(row).map_err(|e| {
            DirectoryError::InvalidResponse(format!("unreadable member record: {e}"))
        })?;

        Ok(member.snapshot(self.today()))
    }

    /// Checks `password` against the directory and keeps it for this session
    /// if accepted. Transport failures are errors; a refusal is `Ok(false)`.
    /// The member rows that come back with the answer are not read.
    pub async fn verify_credential<S>(&mut self, password: S) -> DirectoryResult<bool>
    where
        S: AsRef<str>,
    {
        let password = password.as_ref();
        let reply = self.get(wire::ACTION_GET_ALL, &[("password", password)]).await?;

        if reply.success {
            self.session.login(password.to_string());
            tracing::info!("admin session started");
            Ok(true)
        } else {
            tracing::info!(error = ?reply.error, "admin credential refused");
            Ok(false)
        }
    }

    pub fn logout(&mut self) {
        if self.session.is_logged_in() {
            tracing::info!("admin session ended");
        }
        self.session.logout();
    }

    /// Every readable row in the directory. Rows that are not a valid member
    /// record, such as blank lines in the sheet, are skipped with a warning.
    pub async fn list_all(&self) -> DirectoryResult<Vec<MemberSnapshot>> {
        let password = self.credential()?;
        let reply = self.get(wire::ACTION_GET_ALL, &[("password", password)]).await?;
        let reply = ensure_success(reply, wire::ACTION_GET_ALL, "Failed to fetch members")?;

        let today = self.today();
        let rows = reply.members.ok_or_else(|| {
            DirectoryError::InvalidResponse("reply has no member list".to_string())
        })?;

        let mut members = Vec::with_capacity(rows.len());
        for (index, row) in rows.into_iter().enumerate() {
            match serde_json::from_value::<Member>(row) {
                Ok(member) => members.push(member.snapshot(today)),
                Err(e) => {
                    tracing::warn!(row = index, error = %e, "skipping unreadable directory row")
                }
            }
        }

        Ok(members)
    }

    /// Enrolls a new member. The end date is computed here, not trusted from input.
    pub async fn create(&self, new_member: NewMember) -> DirectoryResult<Member> {
        let password = self.credential()?;
        let member = new_member.into_member()?;

        let reply = self.post(password, AdminAction::AddMember { member: &member }).await?;
        ensure_success(reply, wire::ACTION_ADD, "Failed to add member")?;

        Ok(member)
    }

    /// Merges `changes` into the stored record and writes the whole record back.
    pub async fn update(&self, id: &MemberId, changes: &MemberUpdate) -> DirectoryResult<Member> {
        let password = self.credential()?;

        let mut member = self.lookup(id).await?.member;
        changes.apply_to(&mut member)?;

        let reply = self.post(password, AdminAction::UpdateMember { member: &member }).await?;
        ensure_success(reply, wire::ACTION_UPDATE, "Failed to update member")?;

        Ok(member)
    }

    /// Starts a new plan cycle. `start_date` is free text and must be a
    /// calendar date.
    pub async fn renew<S>(
        &self,
        id: &MemberId,
        plan: MembershipType,
        start_date: S,
    ) -> DirectoryResult<Renewal>
    where
        S: AsRef<str>,
    {
        let password = self.credential()?;
        let start_date = lifecycle::parse_date(start_date)?;
        let end_date = lifecycle::compute_end_date(start_date, plan);

        let action = AdminAction::RenewMember {
            member_id: id,
            membership_type: plan,
            start_date,
        };
        let reply = self.post(password, action).await?;
        let reply = ensure_success(reply, wire::ACTION_RENEW, "Failed to renew membership")?;

        if let Some(reported) = reply.new_end_date.as_deref() {
            match lifecycle::parse_date(reported) {
                Ok(reported) if reported == end_date => {}
                _ => tracing::warn!(
                    member_id = %id,
                    reported,
                    computed = %end_date,
                    "directory reported a different end date; keeping the computed one"
                ),
            }
        }

        Ok(Renewal {
            member_id: id.clone(),
            membership_type: plan,
            start_date,
            end_date,
        })
    }

    pub async fn delete(&self, id: &MemberId) -> DirectoryResult<()> {
        let password = self.credential()?;

        let reply = self.post(password, AdminAction::DeleteMember { member_id: id }).await?;
        ensure_success(reply, wire::ACTION_DELETE, "Failed to delete member")?;

        Ok(())
    }

    fn credential(&self) -> DirectoryResult<&str> {
        self.session
            .credential()
            .ok_or_else(|| DirectoryError::Auth("Admin login required".to_string()))
    }

    fn endpoint(&self) -> DirectoryResult<&Url> {
        self.config.endpoint().ok_or(DirectoryError::NotConfigured)
    }

    async fn get(&self, action: &str, params: &[(&str, &str)]) -> DirectoryResult<Reply> {
        let mut url = self.endpoint()?.clone();
        url.query_pairs_mut()
            .append_pair("action", action)
            .extend_pairs(params.iter().copied());

        tracing::debug!(action, "directory GET");
        self.send(self.http.get(url)).await
    }

    async fn post(&self, password: &str, action: AdminAction<'_>) -> DirectoryResult<Reply> {
        let url = self.endpoint()?.clone();
        let name = action.name();
        let body = serde_json::to_string(&AdminRequest { password, action }).map_err(|e| {
            DirectoryError::InvalidResponse(format!("could not encode request: {e}"))
        })?;

        tracing::debug!(action = name, "directory POST");

        // The script endpoint only accepts simple requests, so the JSON goes
        // out as plain text.
        let request = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "text/plain;charset=utf-8")
            .body(body);
        self.send(request).await
    }

    async fn send(&self, request: RequestBuilder) -> DirectoryResult<Reply> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    DirectoryError::Auth(format!("directory returned {status}"))
                }
                _ => DirectoryError::Rejected(format!("directory returned {status}")),
            });
        }

        serde_json::from_str(&text).map_err(|e| {
            tracing::debug!(%status, error = %e, "reply is not a directory envelope");
            DirectoryError::InvalidResponse(e.to_string())
        })
    }
}

/// Directories on the local machine are reached directly, bypassing any
/// proxy configured in the environment.
fn build_http(config: &DirectoryConfig) -> DirectoryResult<Client> {
    let mut builder = Client::builder().timeout(config.timeout());

    if config.endpoint().is_some_and(is_loopback) {
        builder = builder.no_proxy();
    }

    Ok(builder.build()?)
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        None => false,
    }
}

fn ensure_success(reply: Reply, action: &str, default_error: &str) -> DirectoryResult<Reply> {
    if reply.success {
        if let Some(message) = reply.message.as_deref() {
            tracing::debug!(message, "directory accepted request");
        }
        return Ok(reply);
    }

    let message = reply
        .error
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| default_error.to_string());

    Err(DirectoryError::from_message(action, message))
}

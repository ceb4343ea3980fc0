use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use twilight_model::id::marker::{ChannelMarker, GuildMarker, MessageMarker, RoleMarker, UserMarker};
use twilight_model::id::Id;
use warden_logger::{error, warn};
use warden_storage::{Error, Json, Key, Stored};

pub use self::route::RouteTimeEntry;
pub use self::watch::WatchSession;

/// Provides route time windows.
mod route;
/// Provides transient route watch sessions.
mod watch;

/// The persisted state document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Every known guild's configuration.
    #[serde(default)]
    pub server_configs: BTreeMap<Id<GuildMarker>, GuildConfig>,
}

impl Stored for Document {
    type Arguments = PathBuf;
    type Format = Json;

    fn stored(path: Self::Arguments) -> Key<Self, Self::Format> {
        Key::new_default(path)
    }
}

/// A guild's configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuildConfig {
    /// The guild identifier.
    pub guild_id: Id<GuildMarker>,
    /// The channel that receives rejoin logs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejoin_log_channel_id: Option<Id<ChannelMarker>>,
    /// The channel that receives role assignment logs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_assignment_log_channel_id: Option<Id<ChannelMarker>>,
    /// The channel that receives role assignment error logs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_error_log_channel_id: Option<Id<ChannelMarker>>,
    /// The channel containing the role selection message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_selection_channel_id: Option<Id<ChannelMarker>>,
    /// The role selection message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_selection_message_id: Option<Id<MessageMarker>>,
    /// The channel that receives worker applications and worker notices.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_info_channel_id: Option<Id<ChannelMarker>>,
    /// The channel listing every worker's password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_password_channel_id: Option<Id<ChannelMarker>>,
    /// The channel containing the route control menu.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_control_channel_id: Option<Id<ChannelMarker>>,
    /// The channel that receives route control logs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_control_log_channel_id: Option<Id<ChannelMarker>>,
    /// The route control menu message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route_control_message_id: Option<Id<MessageMarker>>,
    /// Emoji bound to selectable roles.
    #[serde(default)]
    pub reaction_roles: BTreeMap<String, Id<RoleMarker>>,
    /// Every member's role assignment.
    #[serde(default)]
    pub user_roles: Vec<UserRole>,
    /// Every family's channels, keyed by the family role.
    #[serde(default)]
    pub family_channels: BTreeMap<Id<RoleMarker>, FamilyChannels>,
    /// Roles that may use the bot's commands.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command_roles: Vec<Id<RoleMarker>>,
    /// Channels every family may view.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub info_channels: Vec<Id<ChannelMarker>>,
    /// Worker applications awaiting a decision.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending_worker_applications: Vec<WorkerApplication>,
}

/// A member's role assignment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRole {
    /// The member.
    pub user_id: Id<UserMarker>,
    /// The assigned role.
    pub role_id: Id<RoleMarker>,
    /// When the role was assigned.
    #[serde(with = "time::serde::rfc3339")]
    pub assigned_at: OffsetDateTime,
    /// The employer that accepted the member, for workers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employer_id: Option<Id<UserMarker>>,
    /// The worker's issued password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl UserRole {
    /// Creates a plain role assignment.
    #[must_use]
    pub const fn new(user_id: Id<UserMarker>, role_id: Id<RoleMarker>, assigned_at: OffsetDateTime) -> Self {
        Self { user_id, role_id, assigned_at, employer_id: None, password: None }
    }

    /// Attaches an employer and password to this assignment.
    #[must_use]
    pub fn with_employer(mut self, employer_id: Id<UserMarker>, password: impl Into<String>) -> Self {
        self.employer_id = Some(employer_id);
        self.password = Some(password.into());

        self
    }
}

/// A family's category and channels.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyChannels {
    /// The family category.
    pub category_id: Id<ChannelMarker>,
    /// The route time channel.
    pub time_channel_id: Id<ChannelMarker>,
    /// The communication channel.
    pub comm_channel_id: Id<ChannelMarker>,
    /// The route password channel.
    pub password_channel_id: Id<ChannelMarker>,
    /// The family's route windows.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub route_times: Vec<RouteTimeEntry>,
}

impl FamilyChannels {
    /// Returns every channel of this family, category last.
    #[must_use]
    pub const fn channel_ids(&self) -> [Id<ChannelMarker>; 4] {
        [self.time_channel_id, self.comm_channel_id, self.password_channel_id, self.category_id]
    }

    /// Returns the route windows that have not ended at the given time.
    pub fn active_routes(&self, now: OffsetDateTime) -> impl Iterator<Item = &RouteTimeEntry> {
        self.route_times.iter().filter(move |entry| !entry.is_expired(now))
    }
}

/// A worker application awaiting the employer's decision.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerApplication {
    /// The applicant.
    pub worker_id: Id<UserMarker>,
    /// The requested employer.
    pub employer_id: Id<UserMarker>,
    /// The worker role.
    pub role_id: Id<RoleMarker>,
    /// When the application was submitted.
    #[serde(with = "time::serde::rfc3339")]
    pub applied_at: OffsetDateTime,
}

impl GuildConfig {
    /// Creates an empty configuration for the given guild.
    #[must_use]
    pub const fn new(guild_id: Id<GuildMarker>) -> Self {
        Self {
            guild_id,
            rejoin_log_channel_id: None,
            role_assignment_log_channel_id: None,
            role_error_log_channel_id: None,
            role_selection_channel_id: None,
            role_selection_message_id: None,
            worker_info_channel_id: None,
            worker_password_channel_id: None,
            route_control_channel_id: None,
            route_control_log_channel_id: None,
            route_control_message_id: None,
            reaction_roles: BTreeMap::new(),
            user_roles: Vec::new(),
            family_channels: BTreeMap::new(),
            command_roles: Vec::new(),
            info_channels: Vec::new(),
            pending_worker_applications: Vec::new(),
        }
    }

    /// Returns the given member's role assignment.
    #[must_use]
    pub fn assignment(&self, user_id: Id<UserMarker>) -> Option<&UserRole> {
        self.user_roles.iter().find(|r| r.user_id == user_id)
    }

    /// Records the given assignment, returning `false` if the member already holds one.
    pub fn try_assign(&mut self, assignment: UserRole) -> bool {
        if self.assignment(assignment.user_id).is_some() {
            return false;
        }

        self.user_roles.push(assignment);

        true
    }

    /// Removes and returns the given member's role assignment.
    pub fn remove_assignment(&mut self, user_id: Id<UserMarker>) -> Option<UserRole> {
        let index = self.user_roles.iter().position(|r| r.user_id == user_id)?;

        Some(self.user_roles.remove(index))
    }

    /// Returns every assignment that was issued to a worker.
    pub fn workers(&self) -> impl Iterator<Item = &UserRole> {
        self.user_roles.iter().filter(|r| r.employer_id.is_some())
    }

    /// Binds the emoji to the role, returning `false` if the emoji is already bound.
    pub fn bind(&mut self, emoji: impl Into<String>, role_id: Id<RoleMarker>) -> bool {
        let emoji = emoji.into();

        if self.reaction_roles.contains_key(&emoji) {
            return false;
        }

        self.reaction_roles.insert(emoji, role_id);

        true
    }

    /// Returns the role bound to the given emoji.
    #[must_use]
    pub fn role_for_emoji(&self, emoji: &str) -> Option<Id<RoleMarker>> {
        self.reaction_roles.get(emoji).copied()
    }

    /// Returns whether the given role is bound to any emoji.
    #[must_use]
    pub fn is_bound(&self, role_id: Id<RoleMarker>) -> bool {
        self.reaction_roles.values().any(|id| *id == role_id)
    }

    /// Drops every binding whose role does not satisfy the predicate, returning how many were
    /// dropped.
    pub fn retain_roles(&mut self, mut exists: impl FnMut(Id<RoleMarker>) -> bool) -> usize {
        let before = self.reaction_roles.len();

        self.reaction_roles.retain(|_, role_id| exists(*role_id));

        before - self.reaction_roles.len()
    }

    /// Records a new family, returning `false` if the emoji is already bound.
    pub fn add_family(&mut self, emoji: impl Into<String>, role_id: Id<RoleMarker>, channels: FamilyChannels) -> bool {
        if !self.bind(emoji, role_id) {
            return false;
        }

        self.family_channels.insert(role_id, channels);

        true
    }

    /// Removes a family's channels and every emoji bound to its role.
    pub fn remove_family(&mut self, role_id: Id<RoleMarker>) -> Option<FamilyChannels> {
        let channels = self.family_channels.remove(&role_id)?;

        self.reaction_roles.retain(|_, id| *id != role_id);

        Some(channels)
    }

    /// Appends a route window to the family, returning `false` if the family does not exist.
    pub fn push_route(&mut self, role_id: Id<RoleMarker>, entry: RouteTimeEntry) -> bool {
        let Some(family) = self.family_channels.get_mut(&role_id) else {
            return false;
        };

        family.route_times.push(entry);

        true
    }

    /// Drops every route window that has ended, returning the families that lost an entry.
    pub fn prune_routes(&mut self, now: OffsetDateTime) -> Vec<Id<RoleMarker>> {
        let mut pruned = Vec::new();

        for (role_id, family) in &mut self.family_channels {
            let before = family.route_times.len();

            family.route_times.retain(|entry| !entry.is_expired(now));

            if family.route_times.len() != before {
                pruned.push(*role_id);
            }
        }

        pruned
    }

    /// Returns whether any of the given roles may use commands.
    #[must_use]
    pub fn is_commander(&self, roles: &[Id<RoleMarker>]) -> bool {
        roles.iter().any(|id| self.command_roles.contains(id))
    }

    /// Adds a command role, returning `false` if it was already added.
    pub fn add_command_role(&mut self, role_id: Id<RoleMarker>) -> bool {
        self::insert_unique(&mut self.command_roles, role_id)
    }

    /// Removes a command role, returning `false` if it was not added.
    pub fn remove_command_role(&mut self, role_id: Id<RoleMarker>) -> bool {
        self::remove_item(&mut self.command_roles, &role_id)
    }

    /// Adds an info channel, returning `false` if it was already added.
    pub fn add_info_channel(&mut self, channel_id: Id<ChannelMarker>) -> bool {
        self::insert_unique(&mut self.info_channels, channel_id)
    }

    /// Removes an info channel, returning `false` if it was not added.
    pub fn remove_info_channel(&mut self, channel_id: Id<ChannelMarker>) -> bool {
        self::remove_item(&mut self.info_channels, &channel_id)
    }

    /// Queues a worker application.
    pub fn add_pending(&mut self, application: WorkerApplication) {
        self.pending_worker_applications.push(application);
    }

    /// Removes and returns the oldest application between the given worker and employer.
    pub fn take_pending(
        &mut self,
        worker_id: Id<UserMarker>,
        employer_id: Id<UserMarker>,
    ) -> Option<WorkerApplication> {
        let index = self
            .pending_worker_applications
            .iter()
            .position(|a| a.worker_id == worker_id && a.employer_id == employer_id)?;

        Some(self.pending_worker_applications.remove(index))
    }
}

/// Pushes the item if the list does not contain it yet.
fn insert_unique<T: PartialEq>(list: &mut Vec<T>, item: T) -> bool {
    if list.contains(&item) {
        return false;
    }

    list.push(item);

    true
}

/// Removes every occurrence of the item, returning whether any existed.
fn remove_item<T: PartialEq>(list: &mut Vec<T>, item: &T) -> bool {
    let before = list.len();

    list.retain(|value| value != item);

    list.len() != before
}

/// The in-memory guild registry, backed by a single JSON file.
#[derive(Debug)]
pub struct Registry {
    /// The document's storage key.
    key: Key<Document, Json>,
    /// The loaded document.
    document: Document,
}

impl Registry {
    /// Loads the registry from the given file.
    ///
    /// A missing or unreadable file yields an empty registry.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let key = Document::stored(path.as_ref().to_path_buf());
        let document = key
            .read_or_else(|error| {
                if !matches!(error, Error::Io(ref error) if error.kind() == ErrorKind::NotFound) {
                    warn!("unable to read state file, starting empty - {error}").ok();
                }

                Document::default()
            })
            .get_owned();

        Self { key, document }
    }

    /// Returns the backing file's path.
    #[must_use]
    pub const fn path(&self) -> &Path {
        self.key.path()
    }

    /// Returns the loaded document.
    #[must_use]
    pub const fn document(&self) -> &Document {
        &self.document
    }

    /// Writes the entire document to disk. Failures are logged.
    pub fn save(&self) {
        if let Err(error) = self.key.write(&self.document) {
            error!("unable to save state file '{}' - {error}", self.path().display()).ok();
        }
    }

    /// Returns the guild's configuration, creating and saving a default one on first access.
    pub fn get(&mut self, guild_id: Id<GuildMarker>) -> &mut GuildConfig {
        if !self.document.server_configs.contains_key(&guild_id) {
            self.document.server_configs.insert(guild_id, GuildConfig::new(guild_id));
            self.save();
        }

        self.document.server_configs.entry(guild_id).or_insert_with(|| GuildConfig::new(guild_id))
    }

    /// Returns every known guild.
    #[must_use]
    pub fn guild_ids(&self) -> Vec<Id<GuildMarker>> {
        self.document.server_configs.keys().copied().collect()
    }
}

/// The bot's shared state.
#[derive(Debug)]
pub struct State {
    /// The guild registry.
    registry: Mutex<Registry>,
    /// Every guild's active route watch.
    watches: Mutex<HashMap<Id<GuildMarker>, WatchSession>>,
}

impl State {
    /// Creates a new shared state around the given registry.
    #[must_use]
    pub fn new(registry: Registry) -> Self {
        Self { registry: Mutex::new(registry), watches: Mutex::default() }
    }

    /// Loads the shared state from the given file.
    pub fn load(path: impl AsRef<Path>) -> Self {
        Self::new(Registry::load(path))
    }

    /// Returns a snapshot of the guild's configuration.
    pub async fn config(&self, guild_id: Id<GuildMarker>) -> GuildConfig {
        self.registry.lock().await.get(guild_id).clone()
    }

    /// Applies the mutation to the guild's configuration and saves the document.
    pub async fn update<T>(&self, guild_id: Id<GuildMarker>, f: impl FnOnce(&mut GuildConfig) -> T + Send) -> T {
        let mut registry = self.registry.lock().await;
        let value = f(registry.get(guild_id));

        registry.save();

        value
    }

    /// Returns every known guild.
    pub async fn guild_ids(&self) -> Vec<Id<GuildMarker>> {
        self.registry.lock().await.guild_ids()
    }

    /// Starts a route watch, returning the session it replaced.
    pub async fn start_watch(&self, guild_id: Id<GuildMarker>, session: WatchSession) -> Option<WatchSession> {
        self.watches.lock().await.insert(guild_id, session)
    }

    /// Stops the guild's route watch, returning the session if one was running.
    pub async fn stop_watch(&self, guild_id: Id<GuildMarker>) -> Option<WatchSession> {
        self.watches.lock().await.remove(&guild_id)
    }

    /// Returns whether a route watch is running in the guild.
    pub async fn is_watching(&self, guild_id: Id<GuildMarker>) -> bool {
        self.watches.lock().await.contains_key(&guild_id)
    }
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;
    use time::Duration;

    use super::*;

    const NOW: OffsetDateTime = datetime!(2024-03-01 12:00:00 UTC);
    const GUILD: Id<GuildMarker> = Id::new(10);

    fn family(seed: u64) -> FamilyChannels {
        FamilyChannels {
            category_id: Id::new(seed),
            time_channel_id: Id::new(seed + 1),
            comm_channel_id: Id::new(seed + 2),
            password_channel_id: Id::new(seed + 3),
            route_times: Vec::new(),
        }
    }

    #[test]
    fn get_creates_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state/database.json");
        let mut registry = Registry::load(&path);

        registry.get(GUILD).command_roles.push(Id::new(3));

        assert!(path.exists());

        std::fs::remove_file(&path).unwrap();

        assert_eq!(registry.get(GUILD).command_roles, vec![Id::new(3)]);
        assert!(!path.exists());
        assert_eq!(registry.guild_ids(), vec![GUILD]);
    }

    #[test]
    fn unreadable_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database.json");

        std::fs::write(&path, "{ broken").unwrap();

        assert!(Registry::load(&path).document().server_configs.is_empty());
    }

    #[test]
    fn reads_existing_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database.json");
        let json = r#"{
            "serverConfigs": {
                "10": {
                    "guildId": "10",
                    "rejoinLogChannelId": "44",
                    "reactionRoles": { "🏠": "20" },
                    "userRoles": [
                        { "userId": "7", "roleId": "20", "assignedAt": "2024-03-01T12:00:00.000Z" }
                    ],
                    "familyChannels": {
                        "20": {
                            "categoryId": "30",
                            "timeChannelId": "31",
                            "commChannelId": "32",
                            "passwordChannelId": "33",
                            "routeTimes": [{
                                "startTime": "2024-03-01T12:00:00.000Z",
                                "endTime": "2024-03-04T12:00:00.000Z",
                                "addedBy": "7",
                                "addedAt": "2024-03-01T12:00:00.000Z",
                                "password": "alpha"
                            }]
                        }
                    }
                }
            }
        }"#;

        std::fs::write(&path, json).unwrap();

        let mut registry = Registry::load(&path);
        let config = registry.get(GUILD);

        assert_eq!(config.rejoin_log_channel_id, Some(Id::new(44)));
        assert_eq!(config.role_for_emoji("🏠"), Some(Id::new(20)));
        assert_eq!(config.assignment(Id::new(7)).map(|r| r.role_id), Some(Id::new(20)));
        assert!(config.command_roles.is_empty());

        let family = &config.family_channels[&Id::new(20)];

        assert_eq!(family.route_times[0].days_remaining(NOW), 3);
        assert_eq!(family.active_routes(NOW).count(), 1);
    }

    #[test]
    fn one_role_per_member() {
        let mut config = GuildConfig::new(GUILD);

        assert!(config.try_assign(UserRole::new(Id::new(7), Id::new(20), NOW)));
        assert!(!config.try_assign(UserRole::new(Id::new(7), Id::new(21), NOW)));
        assert_eq!(config.user_roles.len(), 1);
        assert_eq!(config.assignment(Id::new(7)).map(|r| r.role_id), Some(Id::new(20)));

        assert!(config.remove_assignment(Id::new(7)).is_some());
        assert!(config.try_assign(UserRole::new(Id::new(7), Id::new(21), NOW)));
    }

    #[test]
    fn removing_a_family_unbinds_it() {
        let mut config = GuildConfig::new(GUILD);
        let smiths = Id::new(20);

        assert!(config.add_family("🏠", smiths, family(30)));
        assert!(!config.add_family("🏠", Id::new(21), family(40)));
        assert!(config.bind("🔥", smiths));

        assert_eq!(config.remove_family(smiths), Some(family(30)));
        assert!(config.reaction_roles.is_empty());
        assert!(config.family_channels.is_empty());
        assert!(config.remove_family(smiths).is_none());
    }

    #[test]
    fn missing_roles_are_unbound() {
        let mut config = GuildConfig::new(GUILD);

        config.bind("🏠", Id::new(20));
        config.bind("🔥", Id::new(21));

        assert_eq!(config.retain_roles(|id| id == Id::new(20)), 1);
        assert!(config.is_bound(Id::new(20)));
        assert!(!config.is_bound(Id::new(21)));
    }

    #[test]
    fn pruning_drops_ended_routes() {
        let mut config = GuildConfig::new(GUILD);
        let smiths = Id::new(20);

        config.add_family("🏠", smiths, family(30));
        config.add_family("🔥", Id::new(21), family(40));

        assert!(config.push_route(smiths, RouteTimeEntry::lasting(NOW, 2, Id::new(7), None)));
        assert!(config.push_route(smiths, RouteTimeEntry::instant(NOW, Id::new(7), "beta".to_string())));
        assert!(config.push_route(smiths, RouteTimeEntry::lasting(NOW, 2, Id::new(7), None)));
        assert!(!config.push_route(Id::new(99), RouteTimeEntry::lasting(NOW, 2, Id::new(7), None)));

        assert_eq!(config.prune_routes(NOW + Duration::hours(1)), vec![smiths]);

        let routes = &config.family_channels[&smiths].route_times;

        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].days_remaining(NOW + Duration::hours(1)), 2);

        assert_eq!(config.prune_routes(NOW + Duration::days(2)), vec![smiths]);
        assert!(config.family_channels[&smiths].route_times.is_empty());
        assert!(config.prune_routes(NOW + Duration::days(3)).is_empty());
    }

    #[test]
    fn command_roles_and_info_channels_reject_duplicates() {
        let mut config = GuildConfig::new(GUILD);

        assert!(config.add_command_role(Id::new(3)));
        assert!(!config.add_command_role(Id::new(3)));
        assert!(config.is_commander(&[Id::new(1), Id::new(3)]));
        assert!(config.remove_command_role(Id::new(3)));
        assert!(!config.remove_command_role(Id::new(3)));
        assert!(!config.is_commander(&[Id::new(3)]));

        assert!(config.add_info_channel(Id::new(50)));
        assert!(!config.add_info_channel(Id::new(50)));
        assert!(config.remove_info_channel(Id::new(50)));
        assert!(!config.remove_info_channel(Id::new(50)));
    }

    #[test]
    fn worker_lifecycle() {
        let mut config = GuildConfig::new(GUILD);
        let (worker, employer, role) = (Id::new(7), Id::new(8), Id::new(60));
        let application = WorkerApplication { worker_id: worker, employer_id: employer, role_id: role, applied_at: NOW };

        config.add_pending(application.clone());
        config.add_pending(application.clone());

        assert!(config.take_pending(worker, Id::new(9)).is_none());
        assert_eq!(config.take_pending(worker, employer), Some(application));
        assert_eq!(config.pending_worker_applications.len(), 1);

        assert!(config.try_assign(UserRole::new(worker, role, NOW).with_employer(employer, "secret")));
        assert!(!config.try_assign(UserRole::new(worker, role, NOW).with_employer(employer, "other")));

        let workers = config.workers().collect::<Vec<_>>();

        assert_eq!(workers.len(), 1);
        assert_eq!(workers[0].password.as_deref(), Some("secret"));

        config.remove_assignment(worker);

        assert_eq!(config.workers().count(), 0);
    }

    #[tokio::test]
    async fn updates_are_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database.json");
        let state = State::load(&path);

        let added = state.update(GUILD, |config| config.add_command_role(Id::new(3))).await;

        assert!(added);
        assert!(state.config(GUILD).await.command_roles.contains(&Id::new(3)));

        let reloaded = State::load(&path);

        assert_eq!(reloaded.config(GUILD).await.command_roles, vec![Id::new(3)]);
        assert_eq!(reloaded.guild_ids().await, vec![GUILD]);
    }

    #[tokio::test]
    async fn watches_are_per_guild() {
        let dir = tempfile::tempdir().unwrap();
        let state = State::load(dir.path().join("database.json"));
        let session = WatchSession::new(NOW, vec!["Anna".to_string()], Id::new(7));

        assert!(state.start_watch(GUILD, session.clone()).await.is_none());
        assert!(state.is_watching(GUILD).await);
        assert!(!state.is_watching(Id::new(11)).await);
        assert_eq!(state.stop_watch(GUILD).await, Some(session));
        assert!(state.stop_watch(GUILD).await.is_none());
    }
}

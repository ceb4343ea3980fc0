use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

use anyhow::bail;
use twilight_model::application::command::Command;
use twilight_model::application::interaction::application_command::{
    CommandData, CommandDataOption, CommandOptionValue,
};
use twilight_model::application::interaction::modal::ModalInteractionData;
use twilight_model::application::interaction::Interaction;
use twilight_model::guild::Permissions;
use twilight_model::id::marker::{ChannelMarker, GuildMarker, RoleMarker, UserMarker};
use twilight_model::id::Id;
use warden_logger::warn;

use crate::bot::cid::CId;
use crate::bot::client::ApiRef;
use crate::bot::interaction::{CommandCtx, ComponentCtx, ModalCtx};
use crate::state::GuildConfig;
use crate::util::Result;

/// The command role commands.
pub mod access;
/// The route control commands and their menu.
pub mod control;
/// The family commands.
pub mod family;
/// The info channel commands.
pub mod info;
/// The log channel commands.
pub mod logs;
/// The role selection commands.
pub mod roles;
/// The route time and password commands.
pub mod route;
/// The worker commands and their application workflow.
pub mod worker;

/// The bot's command registry.
static REGISTRY: OnceLock<CommandRegistry> = OnceLock::new();

/// Initializes the command registry.
macro_rules! init_registry {
    ($($init:expr),* $(,)?) => {
        /// Returns a reference to the bot's command registry.
        pub fn registry() -> &'static CommandRegistry {
            REGISTRY.get_or_init(|| {
                let mut registry = CommandRegistry::new();

                $({
                    let entry = $init();

                    if !registry.register(entry) {
                        ::warden_logger::warn!("the '{}' command has already been registered", entry.name).ok();
                    }
                })*

                registry
            })
        }
    };
}

init_registry![
    self::roles::role_setup::entry,
    self::roles::list_roles::entry,
    self::roles::remove_user::entry,
    self::family::add_family::entry,
    self::family::remove_family::entry,
    self::logs::set_rejoin_log::entry,
    self::logs::set_role_log::entry,
    self::logs::set_role_error_log::entry,
    self::route::set_route_time::entry,
    self::route::add_route_time::entry,
    self::route::set_route_password::entry,
    self::route::add_route_password::entry,
    self::access::add_command_role::entry,
    self::access::remove_command_role::entry,
    self::access::list_command_roles::entry,
    self::info::add_info_channel::entry,
    self::info::remove_info_channel::entry,
    self::info::list_info_channels::entry,
    self::worker::set_worker_info_channel::entry,
    self::worker::set_worker_password_channel::entry,
    self::worker::remove_worker::entry,
    self::control::set_route_control_channel::entry,
    self::control::set_route_log_channel::entry,
];

/// Returns whether the interacting member is an administrator or holds a command role.
pub async fn is_authorized(api: ApiRef<'_>, event: &Interaction) -> bool {
    let (Some(guild_id), Some(member)) = (event.guild_id, event.member.as_ref()) else {
        return false;
    };

    let config = api.state.config(guild_id).await;

    self::authorized(member.permissions, &member.roles, &config)
}

/// Returns whether the given permissions or roles grant access to the bot's commands.
fn authorized(permissions: Option<Permissions>, roles: &[Id<RoleMarker>], config: &GuildConfig) -> bool {
    permissions.is_some_and(|p| p.contains(Permissions::ADMINISTRATOR)) || config.is_commander(roles)
}

/// Stores the command's `channel` option through the given setter and confirms it.
///
/// # Errors
///
/// This function will return an error if the option is missing or the interaction could not be
/// responded to.
pub async fn set_channel<'api: 'evt, 'evt>(
    cmd: &(dyn OnCommand + Send + Sync),
    ctx: CommandCtx<'api, 'evt>,
    set: impl FnOnce(&mut GuildConfig, Id<ChannelMarker>) + Send,
) -> Result {
    let Some(guild_id) = ctx.data.guild_id else {
        bail!("command must be used within a guild");
    };

    let channel_id = *CommandOptionResolver::new(ctx.data).get_channel_id("channel")?;

    ctx.api.state.update(guild_id, |config| set(config, channel_id)).await;

    let locale = crate::util::traits::PreferLocale::preferred_locale(ctx.event);

    ctx.success(locale, format!("{}.set", cmd.entry().name), false).await
}

/// A builder function.
pub type BuildFn = fn(&CommandEntry, Option<Id<GuildMarker>>) -> Result<Command>;

/// Maintains a list of registered commands and their associated interaction handlers.
#[derive(Debug, Default)]
pub struct CommandRegistry {
    /// The inner set of commands.
    inner: HashSet<CommandEntry>,
}

impl CommandRegistry {
    /// Creates a new [`CommandRegistry`].
    #[must_use]
    pub fn new() -> Self {
        Self { inner: HashSet::new() }
    }

    /// Returns the command entry with the given name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CommandEntry> {
        self.inner.iter().find(|e| e.name == name)
    }

    /// Returns the number of registered commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns whether no commands are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Builds all registered commands.
    #[must_use]
    pub fn build_all(&self, guild_id: Option<Id<GuildMarker>>) -> Box<[Command]> {
        let commands = self.inner.iter().filter_map(|e| match e.build(guild_id) {
            Ok(command) => Some(command),
            Err(error) => {
                warn!("the '{}' command failed to build - {error}", e.name).ok();
                None
            }
        });

        commands.collect()
    }

    /// Registers the given command entry, returning whether it was successfully registered.
    #[inline]
    pub fn register(&mut self, entry: CommandEntry) -> bool {
        self.inner.insert(entry)
    }
}

/// An entry within the command registry.
#[derive(Clone, Copy, Debug)]
pub struct CommandEntry {
    /// The command's name.
    pub name: &'static str,
    /// Constructs a Discord command from the entry.
    builder: BuildFn,
    /// A list of getters for the command's interaction event handlers.
    handlers: CommandEntryHandlers,
}

impl CommandEntry {
    /// Creates a new [`CommandEntry`].
    pub const fn new(name: &'static str, builder: BuildFn, handlers: CommandEntryHandlers) -> Self {
        Self { name, builder, handlers }
    }

    /// Returns a constructed Discord command from this [`CommandEntry`].
    ///
    /// # Errors
    ///
    /// This function will return an error if the command could not be constructed.
    #[inline]
    pub fn build(&self, guild_id: Option<Id<GuildMarker>>) -> Result<Command> {
        (self.builder)(self, guild_id)
    }

    /// Returns the command handler of this [`CommandEntry`].
    #[must_use]
    pub fn command(&self) -> Option<Box<dyn OnCommand + Send + Sync>> {
        self.handlers.command.map(|f| f(self))
    }

    /// Returns the component handler of this [`CommandEntry`].
    #[must_use]
    pub fn component(&self) -> Option<Box<dyn OnComponent + Send + Sync>> {
        self.handlers.component.map(|f| f(self))
    }

    /// Returns the modal handler of this [`CommandEntry`].
    #[must_use]
    pub fn modal(&self) -> Option<Box<dyn OnModal + Send + Sync>> {
        self.handlers.modal.map(|f| f(self))
    }
}

impl PartialEq for CommandEntry {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for CommandEntry {}

impl Hash for CommandEntry {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// Maintains a list of getters for a command's interaction event handlers.
#[allow(clippy::type_complexity)] // handled by a macro.
#[derive(Clone, Copy, Debug, Default)]
pub struct CommandEntryHandlers {
    /// Returns a command interaction event handler.
    pub command: Option<fn(&CommandEntry) -> Box<dyn OnCommand + Send + Sync>>,
    /// Returns a component interaction event handler.
    pub component: Option<fn(&CommandEntry) -> Box<dyn OnComponent + Send + Sync>>,
    /// Returns a modal interaction event handler.
    pub modal: Option<fn(&CommandEntry) -> Box<dyn OnModal + Send + Sync>>,
}

impl CommandEntryHandlers {
    /// Creates a new [`CommandEntryHandlers`].
    #[must_use]
    pub const fn new() -> Self {
        Self { command: None, component: None, modal: None }
    }
}

/// Handles a command interaction event.
#[async_trait::async_trait]
pub trait OnCommand {
    /// Returns a reference to the source command entry.
    fn entry(&self) -> &CommandEntry;

    /// Responds to a command interaction event.
    ///
    /// # Errors
    ///
    /// This function will return an error if event handling failed.
    async fn execute<'api: 'evt, 'evt>(&self, ctx: CommandCtx<'api, 'evt>) -> Result;
}

/// Handles a component interaction event.
#[async_trait::async_trait]
pub trait OnComponent {
    /// Returns a reference to the source command entry.
    fn entry(&self) -> &CommandEntry;

    /// Responds to a component interaction event.
    ///
    /// # Errors
    ///
    /// This function will return an error if event handling failed.
    async fn execute<'api: 'evt, 'evt>(&self, ctx: ComponentCtx<'api, 'evt>, id: CId) -> Result;
}

/// Handles a modal interaction event.
#[async_trait::async_trait]
pub trait OnModal {
    /// Returns a reference to the source command entry.
    fn entry(&self) -> &CommandEntry;

    /// Responds to a modal interaction event.
    ///
    /// # Errors
    ///
    /// This function will return an error if event handling failed.
    async fn execute<'api: 'evt, 'evt>(&self, ctx: ModalCtx<'api, 'evt>, id: CId) -> Result;
}

/// Creates a command registry entry.
///
/// Every command is created as a guild-only chat command; use restrictions are checked when an
/// interaction is received.
///
/// ```ignore
/// register_command! {
///     ChatInput("add-route-time") {
///         let options = [
///             Role("role") {
///                 let required = true;
///             },
///             Integer("days") {
///                 let required = true;
///                 let minimum = 1;
///                 let maximum = 365;
///             },
///         ];
///         let handlers = {
///             command = self::execute_command;
///             component = self::execute_component;
///             modal = self::execute_modal;
///         };
///     }
/// }
/// ```
#[macro_export]
macro_rules! register_command {
    {
        $kind:ident($name:literal) {
            $(let options = [$($option_kind:ident($option_name:literal) {$($args:tt)*}),* $(,)?];)?
            $(let handlers = {
                $(command = $command:expr;)?
                $(component = $component:expr;)?
                $(modal = $modal:expr;)?
            };)?
        }
    } => {
        /// Returns this command's entry.
        pub fn entry() -> $crate::cmd::CommandEntry {
            fn build(
                entry: &$crate::cmd::CommandEntry,
                guild_id: ::std::option::Option<::twilight_model::id::Id<::twilight_model::id::marker::GuildMarker>>
            ) -> $crate::util::Result<::twilight_model::application::command::Command> {
                let description = ::warden_localizer::localize!("command.{}.description", entry.name);
                let mut builder = ::twilight_util::builder::command::CommandBuilder::new(
                        entry.name,
                        description,
                        ::twilight_model::application::command::CommandType::$kind,
                    )
                    .name_localizations(::warden_localizer::localize!(in *, "command.{}.name", entry.name))
                    .description_localizations(::warden_localizer::localize!(in *, "command.{}.description", entry.name))
                    .dm_permission(false)
                    $($(.option($crate::register_command!(@option(entry, $option_kind($option_name) { $($args)* }))))*)?;

                if let ::std::option::Option::Some(id) = guild_id {
                    builder = builder.guild_id(id);
                }

                ::std::result::Result::Ok(builder.validate()?.build())
            }

            #[allow(unused_mut)]
            let mut handlers = $crate::cmd::CommandEntryHandlers::new();

            $(
                $(handlers.command = {
                    struct Struct($crate::cmd::CommandEntry);

                    #[::async_trait::async_trait]
                    impl $crate::cmd::OnCommand for Struct {
                        fn entry(&self) -> &$crate::cmd::CommandEntry { &self.0 }

                        #[inline]
                        async fn execute<'api: 'evt, 'evt>(&self, ctx: $crate::bot::interaction::CommandCtx<'api, 'evt>) -> $crate::util::Result {
                            $command(self, ctx).await
                        }
                    }

                    Some(|e| ::std::boxed::Box::new(Struct(*e)))
                };)?
                $(handlers.component = {
                    struct Struct($crate::cmd::CommandEntry);

                    #[::async_trait::async_trait]
                    impl $crate::cmd::OnComponent for Struct {
                        fn entry(&self) -> &$crate::cmd::CommandEntry { &self.0 }

                        #[inline]
                        async fn execute<'api: 'evt, 'evt>(&self, ctx: $crate::bot::interaction::ComponentCtx<'api, 'evt>, id: $crate::bot::cid::CId) -> $crate::util::Result {
                            $component(self, ctx, id).await
                        }
                    }

                    Some(|e| ::std::boxed::Box::new(Struct(*e)))
                };)?
                $(handlers.modal = {
                    struct Struct($crate::cmd::CommandEntry);

                    #[::async_trait::async_trait]
                    impl $crate::cmd::OnModal for Struct {
                        fn entry(&self) -> &$crate::cmd::CommandEntry { &self.0 }

                        #[inline]
                        async fn execute<'api: 'evt, 'evt>(&self, ctx: $crate::bot::interaction::ModalCtx<'api, 'evt>, id: $crate::bot::cid::CId) -> $crate::util::Result {
                            $modal(self, ctx, id).await
                        }
                    }

                    Some(|e| ::std::boxed::Box::new(Struct(*e)))
                };)?
            )?

            $crate::cmd::CommandEntry::new($name, build, handlers)
        }
    };
    (@option($entry:expr, Channel($name:literal) {
        $(let required = $required:literal;)?
        $(let channels = $($channel:ident)|+;)?
    })) => {{
        ::twilight_util::builder::command::ChannelBuilder::new($name, ::warden_localizer::localize!("option.{}.{}.description", $entry.name, $name))
            .name_localizations(::warden_localizer::localize!(in *, "option.{}.{}.name", $entry.name, $name))
            .description_localizations(::warden_localizer::localize!(in *, "option.{}.{}.description", $entry.name, $name))
            $(.required($required))?
            $(.channel_types([$(::twilight_model::channel::ChannelType::$channel),+]))?
    }};
    (@option($entry:expr, Integer($name:literal) {
        $(let required = $required:literal;)?
        $(let minimum = $minimum:literal;)?
        $(let maximum = $maximum:literal;)?
    })) => {{
        ::twilight_util::builder::command::IntegerBuilder::new($name, ::warden_localizer::localize!("option.{}.{}.description", $entry.name, $name))
            .name_localizations(::warden_localizer::localize!(in *, "option.{}.{}.name", $entry.name, $name))
            .description_localizations(::warden_localizer::localize!(in *, "option.{}.{}.description", $entry.name, $name))
            $(.required($required))?
            $(.min_value($minimum))?
            $(.max_value($maximum))?
    }};
    (@option($entry:expr, Role($name:literal) {
        $(let required = $required:literal;)?
    })) => {{
        ::twilight_util::builder::command::RoleBuilder::new($name, ::warden_localizer::localize!("option.{}.{}.description", $entry.name, $name))
            .name_localizations(::warden_localizer::localize!(in *, "option.{}.{}.name", $entry.name, $name))
            .description_localizations(::warden_localizer::localize!(in *, "option.{}.{}.description", $entry.name, $name))
            $(.required($required))?
    }};
    (@option($entry:expr, String($name:literal) {
        $(let required = $required:literal;)?
        $(let minimum = $minimum:literal;)?
        $(let maximum = $maximum:literal;)?
    })) => {{
        ::twilight_util::builder::command::StringBuilder::new($name, ::warden_localizer::localize!("option.{}.{}.description", $entry.name, $name))
            .name_localizations(::warden_localizer::localize!(in *, "option.{}.{}.name", $entry.name, $name))
            .description_localizations(::warden_localizer::localize!(in *, "option.{}.{}.description", $entry.name, $name))
            $(.required($required))?
            $(.min_length($minimum))?
            $(.max_length($maximum))?
    }};
    (@option($entry:expr, User($name:literal) {
        $(let required = $required:literal;)?
    })) => {{
        ::twilight_util::builder::command::UserBuilder::new($name, ::warden_localizer::localize!("option.{}.{}.description", $entry.name, $name))
            .name_localizations(::warden_localizer::localize!(in *, "option.{}.{}.name", $entry.name, $name))
            .description_localizations(::warden_localizer::localize!(in *, "option.{}.{}.description", $entry.name, $name))
            $(.required($required))?
    }};
}

/// Resolves and tracks a command's provided options.
#[derive(Clone, Debug, PartialEq)]
pub struct CommandOptionResolver<'evt> {
    /// The inner map of options and their values.
    options: HashMap<&'evt str, &'evt CommandOptionValue>,
}

impl<'evt> CommandOptionResolver<'evt> {
    /// Creates a new [`CommandOptionResolver`] with the given options.
    #[inline]
    #[must_use]
    fn new_from(options: &'evt [CommandDataOption]) -> Self {
        Self { options: options.iter().map(|o| (&(*o.name), &o.value)).collect() }
    }

    /// Creates a new [`CommandOptionResolver`] with the given data.
    #[inline]
    #[must_use]
    pub fn new(data: &'evt CommandData) -> Self {
        Self::new_from(&data.options)
    }

    /// Returns a reference to a stored [`CommandOptionValue`] with the given name.
    ///
    /// # Errors
    ///
    /// This function will return an error if the requested option does not exist.
    fn get(&self, name: &str) -> Result<&'evt CommandOptionValue> {
        let Some(value) = self.options.get(name) else {
            bail!("missing value for option '{name}'");
        };

        Ok(*value)
    }
}

/// Generates getter methods for the [`CommandOptionResolver`] struct.
///
/// # Examples
///
/// ```ignore
/// command_option_resolver_getter! {
///     /// Gets an integer.
///     fn get_i64() -> Integer as i64;
/// }
/// ```
macro_rules! command_option_resolver_getter {
    ($(
        $(#[$attribute:meta])*
        fn $name:ident() -> $variant:ident as $return:ty;
    )*) => {
        impl<'evt> CommandOptionResolver<'evt> {$(
            $(#[$attribute])*
            pub fn $name(&self, name: &str) -> Result<&'evt $return> {
                let CommandOptionValue::$variant(ref value) = self.get(name)? else {
                    bail!("invalid type for option '{name}'");
                };

                Ok(value)
            }
        )*}
    };
}

command_option_resolver_getter! {
    /// Returns a reference to a stored [`Id<ChannelMarker>`] with the given name.
    ///
    /// # Errors
    ///
    /// This function will return an error if the option does not exist or the value associated with
    /// the given option name is an invalid type.
    fn get_channel_id() -> Channel as Id<ChannelMarker>;

    /// Returns a reference to a stored [`i64`] with the given name.
    ///
    /// # Errors
    ///
    /// This function will return an error if the option does not exist or the value associated with
    /// the given option name is an invalid type.
    fn get_i64() -> Integer as i64;

    /// Returns a reference to a stored [`Id<RoleMarker>`] with the given name.
    ///
    /// # Errors
    ///
    /// This function will return an error if the option does not exist or the value associated with
    /// the given option name is an invalid type.
    fn get_role_id() -> Role as Id<RoleMarker>;

    /// Returns a reference to a stored [`str`] with the given name.
    ///
    /// # Errors
    ///
    /// This function will return an error if the option does not exist or the value associated with
    /// the given option name is an invalid type.
    fn get_str() -> String as str;

    /// Returns a reference to a stored [`Id<UserMarker>`] with the given name.
    ///
    /// # Errors
    ///
    /// This function will return an error if the option does not exist or the value associated with
    /// the given option name is an invalid type.
    fn get_user_id() -> User as Id<UserMarker>;
}

/// Resolves the text fields submitted with a modal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModalFieldResolver<'evt> {
    /// The inner map of fields and their values.
    fields: HashMap<&'evt str, &'evt str>,
}

impl<'evt> ModalFieldResolver<'evt> {
    /// Creates a new [`ModalFieldResolver`] with the given data.
    #[must_use]
    pub fn new(data: &'evt ModalInteractionData) -> Self {
        let fields = data.components.iter().flat_map(|row| &row.components);
        let fields = fields.filter_map(|c| Some((c.custom_id.as_str(), c.value.as_deref()?.trim())));

        Self { fields: fields.collect() }
    }

    /// Returns the trimmed value of the given field, if it was filled in.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&'evt str> {
        self.fields.get(name).copied().filter(|v| !v.is_empty())
    }

    /// Returns the trimmed value of the given required field.
    ///
    /// # Errors
    ///
    /// This function will return an error if the field is missing or empty.
    pub fn get_required(&self, name: &str) -> Result<&'evt str> {
        let Some(value) = self.get(name) else {
            bail!("missing value for field '{name}'");
        };

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use twilight_model::application::interaction::modal::{
        ModalInteractionDataActionRow, ModalInteractionDataComponent,
    };
    use twilight_model::channel::message::component::ComponentType;

    use super::*;

    #[test]
    fn registry_holds_every_command() {
        let registry = registry();

        assert_eq!(registry.len(), 23);
        assert!(registry.get("role-setup").is_some());
        assert!(registry.get("set-route-log-channel").is_some());
        assert!(registry.get("help").is_none());
    }

    #[test]
    fn interactive_commands_have_handlers() {
        let registry = registry();

        for entry in ["role-setup", "remove-worker", "set-route-control-channel"] {
            assert!(registry.get(entry).and_then(CommandEntry::component).is_some(), "{entry}");
        }

        assert!(registry.get("remove-worker").and_then(CommandEntry::modal).is_some());
        assert!(registry.get("list-roles").and_then(CommandEntry::component).is_none());
    }

    #[test]
    fn administrators_and_command_roles_are_authorized() {
        let mut config = GuildConfig::new(Id::new(1));

        config.add_command_role(Id::new(5));

        assert!(authorized(Some(Permissions::ADMINISTRATOR | Permissions::SEND_MESSAGES), &[], &config));
        assert!(authorized(Some(Permissions::empty()), &[Id::new(4), Id::new(5)], &config));
        assert!(!authorized(Some(Permissions::MANAGE_ROLES), &[Id::new(4)], &config));
        assert!(!authorized(None, &[], &config));
    }

    fn field(custom_id: &str, value: Option<&str>) -> ModalInteractionDataActionRow {
        ModalInteractionDataActionRow {
            components: vec![ModalInteractionDataComponent {
                custom_id: custom_id.to_string(),
                kind: ComponentType::TextInput,
                value: value.map(ToString::to_string),
            }],
        }
    }

    #[test]
    fn modal_fields_are_trimmed() {
        let data = ModalInteractionData {
            custom_id: "remove-worker$apply".to_string(),
            components: vec![field("employer", Some("  Anna ")), field("notes", Some("   ")), field("other", None)],
        };
        let resolver = ModalFieldResolver::new(&data);

        assert_eq!(resolver.get_required("employer").unwrap(), "Anna");
        assert_eq!(resolver.get("notes"), None);
        assert!(resolver.get_required("other").is_err());
    }
}

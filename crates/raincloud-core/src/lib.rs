// raincloud-core: Shared polling, entity mapping and command dispatch
// between raincloud-api and consumers (CLI).

pub mod attribute;
pub mod command;
pub mod config;
pub mod connection;
pub mod coordinator;
pub mod entity;
pub mod error;
pub mod hub;
pub mod registry;

// ── Primary re-exports ──────────────────────────────────────────────
pub use attribute::{ATTRIBUTION, Platform, icon_for_battery_level};
pub use command::{Command, CommandDispatcher, CommandResult};
pub use config::{
    ALLOWED_WATERING_MINUTES, DEFAULT_POLL_INTERVAL, DEFAULT_WATERING_MINUTES, HubConfig,
    unique_id_for,
};
pub use connection::Connection;
pub use coordinator::{RefreshCoordinator, RefreshStatus};
pub use entity::{
    AttributeState, BooleanObserver, Entity, EntitySnapshot, Observer, ScalarObserver,
    SwitchAction, SwitchObserver,
};
pub use error::{CoreError, FanOutFailure};
pub use hub::{CredentialCheck, Hub, validate_credentials};
pub use registry::{EntityOptions, EntityRegistry};

// Device-access types consumers need alongside the core API.
pub use raincloud_api::{
    AttributeKey, AttributeValue, DeviceClient, ManualWatering, ObjectId, SimulatedAccount,
    Topology,
};

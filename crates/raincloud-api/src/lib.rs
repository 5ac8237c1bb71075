// raincloud-api: Device-access boundary for RainCloud irrigation accounts.
//
// Owns the topology model every layer above shares, the blocking
// `DeviceClient` contract, and a fixture-backed simulated account.

pub mod client;
pub mod error;
pub mod model;
pub mod simulated;

pub use client::{DeviceClient, ManualWatering, Mutation, Session};
pub use error::Error;
pub use model::{
    AttributeKey, AttributeValue, Attributes, Controller, Faucet, ObjectId, Topology, Zone,
};
pub use simulated::{Fault, SimulatedAccount};

//! Fuzz target for the server driver
//!
//! Runs arbitrary operation sequences through the simulation server and
//! checks every standard invariant after each step.

#![no_main]

use kursi_harness::{InvariantRegistry, Operation, SimServer};
use kursi_server::DriverConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: (u64, Vec<Operation>)| {
    let (seed, ops) = input;
    let config = DriverConfig {
        rooms: vec!["room1".to_string(), "room2".to_string()],
        seats_per_room: 3,
        point_history_limit: 2,
        max_connections: 8,
        ..DriverConfig::default()
    };
    let mut server = SimServer::with_seed(seed, config);
    let registry = InvariantRegistry::standard();

    for op in &ops {
        assert!(op.apply(&mut server).is_ok(), "{op:?} failed");
        registry.assert_all(&server.snapshot(), &format!("after {op:?}"));
    }
});

mod transfers;

pub use transfers::GatewayTransferInitiator;

pub mod channel;
pub mod fault;
pub mod modbus;
pub mod register;
pub mod transport;

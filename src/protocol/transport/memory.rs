use async_trait::async_trait;
use parking_lot::Mutex;
use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
    time::Duration,
};

use super::ModbusTransport;
use crate::protocol::fault::ChannelFault;

/// How the simulated module answers a read touching a given address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadBehaviour {
    /// Fail the transaction with this fault.
    Fail(ChannelFault),
    /// Answer with one register less than requested.
    Short,
    /// Never answer within any reasonable timeout.
    Stall,
}

#[derive(Default)]
struct Bank {
    registers: BTreeMap<u16, u16>,
    read_behaviour: HashMap<u16, ReadBehaviour>,
    reachable: bool,
    connected: bool,
    /// Remaining writes that succeed before every further write fails.
    write_budget: Option<usize>,
    writes: Vec<(u16, u16)>,
    connects: usize,
    /// Added to every answered read.
    read_latency: Duration,
}

/// In-memory register bank behaving like a Neptun module.
///
/// Clones share the same bank, so a test can keep one handle while the device
/// owns another. Unset registers read as zero.
#[derive(Clone)]
pub struct MemoryTransport {
    bank: Arc<Mutex<Bank>>,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self {
            bank: Arc::new(Mutex::new(Bank {
                reachable: true,
                ..Default::default()
            })),
        }
    }

    pub fn with_registers(registers: &[(u16, u16)]) -> Self {
        let transport = Self::new();
        for (address, value) in registers {
            transport.set_register(*address, *value);
        }
        transport
    }

    pub fn set_register(&self, address: u16, value: u16) {
        self.bank.lock().registers.insert(address, value);
    }

    /// Store a 32-bit value high word first.
    pub fn set_register_u32(&self, address: u16, value: u32) {
        let mut bank = self.bank.lock();
        bank.registers.insert(address, (value >> 16) as u16);
        bank.registers.insert(address.wrapping_add(1), value as u16);
    }

    pub fn register(&self, address: u16) -> u16 {
        self.bank.lock().registers.get(&address).copied().unwrap_or(0)
    }

    pub fn set_read_behaviour(&self, address: u16, behaviour: ReadBehaviour) {
        self.bank.lock().read_behaviour.insert(address, behaviour);
    }

    pub fn clear_read_behaviour(&self, address: u16) {
        self.bank.lock().read_behaviour.remove(&address);
    }

    /// Make every read take at least `latency`, like a slow but healthy link.
    pub fn set_read_latency(&self, latency: Duration) {
        self.bank.lock().read_latency = latency;
    }

    /// Simulate the module disappearing from (or coming back to) the network.
    /// Going unreachable also drops the current session.
    pub fn set_reachable(&self, reachable: bool) {
        let mut bank = self.bank.lock();
        bank.reachable = reachable;
        if !reachable {
            bank.connected = false;
        }
    }

    /// Let `count` more writes succeed, then fail all following ones.
    pub fn fail_writes_after(&self, count: usize) {
        self.bank.lock().write_budget = Some(count);
    }

    pub fn allow_all_writes(&self) {
        self.bank.lock().write_budget = None;
    }

    /// Every successful write, oldest first.
    pub fn writes(&self) -> Vec<(u16, u16)> {
        self.bank.lock().writes.clone()
    }

    pub fn connect_count(&self) -> usize {
        self.bank.lock().connects
    }
}

#[async_trait]
impl ModbusTransport for MemoryTransport {
    async fn connect(&mut self) -> Result<(), ChannelFault> {
        let mut bank = self.bank.lock();
        if !bank.reachable {
            bank.connected = false;
            return Err(ChannelFault::connection_lost("connection refused"));
        }
        bank.connected = true;
        bank.connects += 1;
        Ok(())
    }

    async fn close(&mut self) {
        self.bank.lock().connected = false;
    }

    fn is_connected(&self) -> bool {
        self.bank.lock().connected
    }

    async fn read_holding_registers(
        &mut self,
        _unit_id: u8,
        address: u16,
        count: u16,
    ) -> Result<Vec<u16>, ChannelFault> {
        let (behaviour, values, latency) = {
            let bank = self.bank.lock();
            if !bank.connected {
                return Err(ChannelFault::NotConnected);
            }
            let behaviour = (0..count)
                .map(|offset| address.wrapping_add(offset))
                .find_map(|addr| bank.read_behaviour.get(&addr).cloned());
            let values: Vec<u16> = (0..count)
                .map(|offset| {
                    let addr = address.wrapping_add(offset);
                    bank.registers.get(&addr).copied().unwrap_or(0)
                })
                .collect();
            (behaviour, values, bank.read_latency)
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        match (behaviour, values) {
            (Some(ReadBehaviour::Fail(fault)), _) => Err(fault),
            (Some(ReadBehaviour::Short), mut values) => {
                values.pop();
                Ok(values)
            }
            (Some(ReadBehaviour::Stall), _) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ChannelFault::connection_lost("stalled read gave up"))
            }
            (None, values) => Ok(values),
        }
    }

    async fn write_register(
        &mut self,
        _unit_id: u8,
        address: u16,
        value: u16,
    ) -> Result<(), ChannelFault> {
        let mut bank = self.bank.lock();
        if !bank.connected {
            return Err(ChannelFault::NotConnected);
        }
        match bank.write_budget {
            Some(0) => return Err(ChannelFault::protocol("slave device failure")),
            Some(ref mut remaining) => *remaining -= 1,
            None => {}
        }
        bank.registers.insert(address, value);
        bank.writes.push((address, value));
        Ok(())
    }

    fn endpoint(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clones_share_the_bank() {
        let handle = MemoryTransport::with_registers(&[(0, 0x0180)]);
        let mut transport = handle.clone();
        transport.connect().await.unwrap();
        assert_eq!(transport.read_holding_registers(240, 0, 1).await.unwrap(), vec![0x0180]);

        transport.write_register(240, 4, 0x000F).await.unwrap();
        assert_eq!(handle.register(4), 0x000F);
        assert_eq!(handle.writes(), vec![(4, 0x000F)]);
    }

    #[tokio::test]
    async fn test_injected_faults() {
        let handle = MemoryTransport::new();
        handle.set_register_u32(107, 123_456);
        let mut transport = handle.clone();
        assert_eq!(
            transport.read_holding_registers(240, 0, 1).await,
            Err(ChannelFault::NotConnected)
        );
        transport.connect().await.unwrap();

        assert_eq!(
            transport.read_holding_registers(240, 107, 2).await.unwrap(),
            vec![0x0001, 0xE240]
        );
        handle.set_read_behaviour(108, ReadBehaviour::Short);
        assert_eq!(transport.read_holding_registers(240, 107, 2).await.unwrap().len(), 1);

        handle.fail_writes_after(1);
        assert!(transport.write_register(240, 1, 1).await.is_ok());
        assert!(transport.write_register(240, 2, 1).await.is_err());

        handle.clear_read_behaviour(108);
        handle.set_read_latency(Duration::from_millis(20));
        let started = tokio::time::Instant::now();
        assert_eq!(transport.read_holding_registers(240, 107, 2).await.unwrap().len(), 2);
        assert!(started.elapsed() >= Duration::from_millis(20));

        handle.set_reachable(false);
        assert!(!transport.is_connected());
        assert!(transport.connect().await.is_err());
    }
}

//! Composite adapter handing the three device-facing ports to the service
//! as one value, so a single `&mut` borrow covers clock, mechanism and
//! network.

use core::net::Ipv4Addr;
use core::num::NonZeroU16;

use crate::app::ports::{ClockPort, ConnectivityError, ConnectivityPort, DispenserPort};
use crate::clock::ClockSample;
use crate::error::ActuatorError;

pub struct Board<C, D, N> {
    pub clock: C,
    pub dispenser: D,
    pub network: N,
}

impl<C, D, N> Board<C, D, N> {
    pub fn new(clock: C, dispenser: D, network: N) -> Self {
        Self {
            clock,
            dispenser,
            network,
        }
    }
}

impl<C: ClockPort, D, N> ClockPort for Board<C, D, N> {
    fn sample(&self) -> ClockSample {
        self.clock.sample()
    }

    fn set_utc_offset_hours(&mut self, hours: i8) {
        self.clock.set_utc_offset_hours(hours);
    }
}

impl<C, D: DispenserPort, N> DispenserPort for Board<C, D, N> {
    fn dispense(&mut self, quantity: NonZeroU16) -> Result<(), ActuatorError> {
        self.dispenser.dispense(quantity)
    }
}

impl<C, D, N: ConnectivityPort> ConnectivityPort for Board<C, D, N> {
    fn connect(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError> {
        self.network.connect(ssid, password)
    }

    fn is_connected(&self) -> bool {
        self.network.is_connected()
    }

    fn access_point_ip(&self) -> Option<Ipv4Addr> {
        self.network.access_point_ip()
    }

    fn station_ip(&self) -> Option<Ipv4Addr> {
        self.network.station_ip()
    }
}

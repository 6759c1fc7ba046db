/// Physical output seam. Pin sampling, debouncing and ADC access live in
/// the board support layer; this crate only commands levels.
pub trait Outputs {
    fn set_watchdog(&mut self, high: bool);
    fn set_sdc_relay(&mut self, closed: bool);
    fn set_ebs1(&mut self, enabled: bool);
    fn set_ebs2(&mut self, enabled: bool);
    fn set_brake_light(&mut self, on: bool);
    fn set_sdc_fault_led(&mut self, on: bool);
    fn set_as_driving_indicator(&mut self, on: bool);
}

/// Recording implementation for tests and the simulator.
#[derive(Debug, Default, Clone)]
pub struct MockOutputs {
    pub watchdog: bool,
    pub watchdog_edges: u32,
    pub sdc_relay_closed: bool,
    pub ebs1_enabled: bool,
    pub ebs2_enabled: bool,
    pub brake_light: bool,
    pub sdc_fault_led: bool,
    pub as_driving_indicator: bool,
}

impl MockOutputs {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Outputs for MockOutputs {
    fn set_watchdog(&mut self, high: bool) {
        if self.watchdog != high {
            self.watchdog_edges += 1;
        }
        self.watchdog = high;
    }

    fn set_sdc_relay(&mut self, closed: bool) {
        self.sdc_relay_closed = closed;
    }

    fn set_ebs1(&mut self, enabled: bool) {
        self.ebs1_enabled = enabled;
    }

    fn set_ebs2(&mut self, enabled: bool) {
        self.ebs2_enabled = enabled;
    }

    fn set_brake_light(&mut self, on: bool) {
        self.brake_light = on;
    }

    fn set_sdc_fault_led(&mut self, on: bool) {
        self.sdc_fault_led = on;
    }

    fn set_as_driving_indicator(&mut self, on: bool) {
        self.as_driving_indicator = on;
    }
}

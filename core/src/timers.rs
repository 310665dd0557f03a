/// Delay and sound down-counters. Something outside the interpreter has to
/// call `tick` at 60Hz.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Timers {
    pub delay: u8,
    pub sound: u8,
}

impl Timers {
    pub fn new() -> Timers {
        Timers::default()
    }

    pub fn tick(&mut self) {
        if self.delay > 0 {
            self.delay -= 1;
        }

        if self.sound > 0 {
            self.sound -= 1;
        }
    }
}

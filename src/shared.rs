//! Endpoint sharing between the USB interrupt and the polling task
//!
//! The USB interrupt polls the device, which advances each class's state
//! machines. The polling task runs the session and stream producers, which
//! start transfers on the same classes. Put each class in a [`Shared`], and
//! access it from both sides. `&Shared<C>` is a [`Channel`] or [`Stream`]
//! whenever `C` is, so the session and producers can use it directly.
//!
//! ```ignore
//! use usb_bridge::{shared::Shared, transport::CommandClass};
//!
//! static COMMAND: Shared<CommandClass<'static, Bus, Countdown>> = ...;
//!
//! // USB ISR
//! COMMAND.with_mut(|command| device.poll(&mut [command]));
//!
//! // Polling task
//! let mut link = &COMMAND;
//! session.check_received(&mut link, &clock);
//! ```
//!
//! Each call holds a critical section for the duration of the closure.
//! Keep the closures short, and never nest them.

use crate::buffer::Overflow;
use crate::transport::{Channel, Stream, TransmitError};
use core::cell::RefCell;
use cortex_m::interrupt::{self, Mutex};

/// Interrupt-safe wrapper around an endpoint class
pub struct Shared<C> {
    inner: Mutex<RefCell<C>>,
}

impl<C> Shared<C> {
    pub const fn new(class: C) -> Self {
        Shared {
            inner: Mutex::new(RefCell::new(class)),
        }
    }

    /// Interrupt-safe, immutable access to the class
    pub fn with<R>(&self, func: impl FnOnce(&C) -> R) -> R {
        interrupt::free(|cs| {
            let class = self.inner.borrow(cs);
            let class = class.borrow();
            func(&*class)
        })
    }

    /// Interrupt-safe, mutable access to the class
    pub fn with_mut<R>(&self, func: impl FnOnce(&mut C) -> R) -> R {
        interrupt::free(|cs| {
            let class = self.inner.borrow(cs);
            let mut class = class.borrow_mut();
            func(&mut *class)
        })
    }
}

impl<C: Channel> Channel for &Shared<C> {
    fn receive_to_idle(&mut self) {
        self.with_mut(|class| class.receive_to_idle());
    }

    fn take_frame(&mut self, dst: &mut [u8]) -> Option<Result<usize, Overflow>> {
        self.with_mut(|class| class.take_frame(dst))
    }

    fn transmit(&mut self, data: &[u8]) -> Result<(), TransmitError> {
        self.with_mut(|class| class.transmit(data))
    }

    fn is_transmit_complete(&mut self) -> bool {
        self.with_mut(|class| class.is_transmit_complete())
    }
}

impl<C: Stream> Stream for &Shared<C> {
    fn send(&mut self, data: &[u8]) -> Result<(), TransmitError> {
        self.with_mut(|class| class.send(data))
    }
}

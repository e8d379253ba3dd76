//! `usb-device` classes for the bridge's bulk endpoints

use super::{Channel, Receiver, Stream, TransmitError, Transmitter, TxComplete};
use crate::buffer::Overflow;
use crate::config::{Config, Speed, FRAME_CAPACITY};
use crate::timer::{Countdown, IdleTimer};
use usb_device::{
    bus::{InterfaceNumber, UsbBus, UsbBusAllocator},
    class::UsbClass,
    descriptor::DescriptorWriter,
    endpoint::{EndpointAddress, EndpointIn, EndpointOut},
    UsbError,
};

/// Interface class code for the vendor specific bulk interfaces.
pub const VENDOR_CLASS: u8 = 0xFF;

/// Largest OUT packet the command endpoint reads at once.
const MAX_PACKET: usize = Speed::High.max_packet_size();

/// The command channel: one bulk IN and one bulk OUT endpoint
///
/// OUT fragments are assembled into frames using the idle timer `T`. When the
/// timer elapses, call [`on_idle_timeout()`](CommandClass::on_idle_timeout).
/// Responses of up to `N` bytes are chunked onto the IN endpoint.
pub struct CommandClass<'a, B: UsbBus, T, const N: usize = FRAME_CAPACITY> {
    interface: InterfaceNumber,
    write_ep: EndpointIn<'a, B>,
    read_ep: EndpointOut<'a, B>,
    tx: Transmitter<N>,
    rx: Receiver<N>,
    timer: T,
}

impl<'a, B: UsbBus, T: IdleTimer, const N: usize> CommandClass<'a, B, T, N> {
    /// Allocate the command interface and its endpoints.
    pub fn new(alloc: &'a UsbBusAllocator<B>, config: &Config, timer: T) -> Self {
        let max_packet_size = config.max_packet_size() as u16;
        let mut tx = Transmitter::new();
        tx.set_zero_length_termination(config.zero_length_termination);
        CommandClass {
            interface: alloc.interface(),
            write_ep: alloc.bulk(max_packet_size),
            read_ep: alloc.bulk(max_packet_size),
            tx,
            rx: Receiver::new(),
            timer,
        }
    }

    /// Open the endpoints, and accept the first frame
    ///
    /// Call once the device is configured.
    pub fn configure(&mut self) {
        let max_packet_size = self.write_ep.max_packet_size() as usize;
        self.tx.open(max_packet_size);
        self.rx.receive_to_idle();
        debug!("COMMAND CONFIGURED");
    }

    /// Close the endpoints, dropping partial frames and transfers.
    pub fn close(&mut self) {
        self.tx.close();
        self.rx.close();
        self.timer.stop();
    }

    /// Declare the frame complete. Call when the idle timer elapses.
    pub fn on_idle_timeout(&mut self) {
        self.rx.on_idle_timeout(&mut self.timer);
    }

    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }
}

impl<B: UsbBus, const N: usize> CommandClass<'_, B, Countdown, N> {
    /// Advance a software idle timer by `microseconds`
    ///
    /// Returns `true` if the timer elapsed, and the frame was declared
    /// complete.
    pub fn advance_idle(&mut self, microseconds: u32) -> bool {
        let elapsed = self.timer.advance(microseconds);
        if elapsed {
            self.on_idle_timeout();
        }
        elapsed
    }
}

impl<B: UsbBus, T: IdleTimer, const N: usize> UsbClass<B> for CommandClass<'_, B, T, N> {
    fn get_configuration_descriptors(
        &self,
        writer: &mut DescriptorWriter,
    ) -> usb_device::Result<()> {
        writer.interface(self.interface, VENDOR_CLASS, 0, 0)?;
        writer.endpoint(&self.write_ep)?;
        writer.endpoint(&self.read_ep)?;
        Ok(())
    }

    fn reset(&mut self) {
        self.close();
    }

    fn endpoint_out(&mut self, addr: EndpointAddress) {
        if addr != self.read_ep.address() {
            return;
        }
        let mut packet = [0; MAX_PACKET];
        match self.read_ep.read(&mut packet) {
            Ok(count) => self.rx.on_fragment(&packet[..count], &mut self.timer),
            Err(UsbError::WouldBlock) => {}
            Err(_err) => {
                warn!("COMMAND OUT READ FAILED: {:?}", _err);
            }
        }
    }

    fn endpoint_in_complete(&mut self, addr: EndpointAddress) {
        if addr == self.write_ep.address() {
            self.tx.on_data_in(&mut self.write_ep);
        }
    }
}

impl<B: UsbBus, T: IdleTimer, const N: usize> Channel for CommandClass<'_, B, T, N> {
    fn receive_to_idle(&mut self) {
        self.rx.receive_to_idle();
    }

    fn take_frame(&mut self, dst: &mut [u8]) -> Option<Result<usize, Overflow>> {
        self.rx.take_frame(dst)
    }

    fn transmit(&mut self, data: &[u8]) -> Result<(), TransmitError> {
        self.tx.set_tx_buffer(&mut self.write_ep, data)
    }

    fn is_transmit_complete(&mut self) -> bool {
        self.tx.is_complete()
    }
}

/// A streaming channel: one bulk IN endpoint
///
/// Used for the histogram and IMU streams. The class transmits whatever bytes
/// the producer hands it, in transfers of up to `N` bytes.
pub struct StreamClass<'a, B: UsbBus, const N: usize = FRAME_CAPACITY> {
    interface: InterfaceNumber,
    write_ep: EndpointIn<'a, B>,
    tx: Transmitter<N>,
}

impl<'a, B: UsbBus, const N: usize> StreamClass<'a, B, N> {
    /// Allocate a stream interface and its endpoint.
    pub fn new(alloc: &'a UsbBusAllocator<B>, config: &Config) -> Self {
        let mut tx = Transmitter::new();
        tx.set_zero_length_termination(config.zero_length_termination);
        StreamClass {
            interface: alloc.interface(),
            write_ep: alloc.bulk(config.max_packet_size() as u16),
            tx,
        }
    }

    /// Invoke `callback` from interrupt context after each finished transfer.
    pub fn on_complete(mut self, callback: TxComplete) -> Self {
        self.tx.set_on_complete(Some(callback));
        self
    }

    /// Open the endpoint. Call once the device is configured.
    pub fn configure(&mut self) {
        let max_packet_size = self.write_ep.max_packet_size() as usize;
        self.tx.open(max_packet_size);
        debug!("STREAM {:?} CONFIGURED", self.write_ep.address());
    }

    pub fn close(&mut self) {
        self.tx.close();
    }

    /// Indicates if a transfer is in flight.
    pub fn is_busy(&self) -> bool {
        self.tx.is_busy()
    }
}

impl<B: UsbBus, const N: usize> UsbClass<B> for StreamClass<'_, B, N> {
    fn get_configuration_descriptors(
        &self,
        writer: &mut DescriptorWriter,
    ) -> usb_device::Result<()> {
        writer.interface(self.interface, VENDOR_CLASS, 0, 0)?;
        writer.endpoint(&self.write_ep)?;
        Ok(())
    }

    fn reset(&mut self) {
        self.close();
    }

    fn endpoint_in_complete(&mut self, addr: EndpointAddress) {
        if addr == self.write_ep.address() {
            self.tx.on_data_in(&mut self.write_ep);
        }
    }
}

impl<B: UsbBus, const N: usize> Stream for StreamClass<'_, B, N> {
    fn send(&mut self, data: &[u8]) -> Result<(), TransmitError> {
        self.tx.set_tx_buffer(&mut self.write_ep, data)
    }
}

#[cfg(test)]
mod test {
    extern crate std;
    use std::{sync::Mutex, vec::Vec};

    use super::{CommandClass, StreamClass};
    use crate::config::{Config, Speed, IDLE_TIMEOUT_US};
    use crate::timer::Countdown;
    use crate::transport::{Channel, Stream, TransmitError};
    use core::sync::atomic::{AtomicUsize, Ordering};
    use usb_device::{
        bus::{PollResult, UsbBus, UsbBusAllocator},
        class::UsbClass,
        device::{UsbDeviceBuilder, UsbVidPid},
        endpoint::{EndpointAddress, EndpointType},
        UsbDirection, UsbError,
    };

    /// A host on the other end of the cable
    ///
    /// Serves queued OUT packets, and records every IN packet.
    #[derive(Default)]
    struct HostBus {
        next_index: usize,
        outgoing: Mutex<Vec<(EndpointAddress, Vec<u8>)>>,
        received: Mutex<Vec<(EndpointAddress, Vec<u8>)>>,
    }

    impl HostBus {
        fn send(&self, addr: EndpointAddress, packet: &[u8]) {
            self.outgoing.lock().unwrap().push((addr, packet.to_vec()));
        }

        fn queued(&self) -> usize {
            self.outgoing.lock().unwrap().len()
        }

        /// Lengths of the packets received on `addr`, in order.
        fn received(&self, addr: EndpointAddress) -> Vec<usize> {
            self.received
                .lock()
                .unwrap()
                .iter()
                .filter(|(ep, _)| *ep == addr)
                .map(|(_, packet)| packet.len())
                .collect()
        }
    }

    impl UsbBus for HostBus {
        fn alloc_ep(
            &mut self,
            ep_dir: UsbDirection,
            ep_addr: Option<EndpointAddress>,
            _: EndpointType,
            _: u16,
            _: u8,
        ) -> usb_device::Result<EndpointAddress> {
            if let Some(addr) = ep_addr {
                return Ok(addr);
            }
            self.next_index += 1;
            Ok(EndpointAddress::from_parts(self.next_index, ep_dir))
        }
        fn enable(&mut self) {}
        fn reset(&self) {}
        fn set_device_address(&self, _: u8) {}
        fn write(&self, ep_addr: EndpointAddress, buf: &[u8]) -> usb_device::Result<usize> {
            self.received.lock().unwrap().push((ep_addr, buf.to_vec()));
            Ok(buf.len())
        }
        fn read(&self, ep_addr: EndpointAddress, buf: &mut [u8]) -> usb_device::Result<usize> {
            let mut outgoing = self.outgoing.lock().unwrap();
            let idx = outgoing
                .iter()
                .position(|(ep, _)| *ep == ep_addr)
                .ok_or(UsbError::WouldBlock)?;
            let (_, packet) = outgoing.remove(idx);
            buf[..packet.len()].copy_from_slice(&packet);
            Ok(packet.len())
        }
        fn set_stalled(&self, _: EndpointAddress, _: bool) {}
        fn is_stalled(&self, _: EndpointAddress) -> bool {
            false
        }
        fn suspend(&self) {}
        fn resume(&self) {}
        fn poll(&self) -> PollResult {
            PollResult::None
        }
    }

    const VID_PID: UsbVidPid = UsbVidPid(0x1209, 0x0001);

    #[test]
    fn command_frames_across_a_bus_reset() {
        let alloc = UsbBusAllocator::new(HostBus::default());
        let config = Config::new();
        let mut class: CommandClass<'_, HostBus, Countdown> =
            CommandClass::new(&alloc, &config, Countdown::for_idle(&config));
        let device = UsbDeviceBuilder::new(&alloc, VID_PID).build();
        let host = device.bus();
        let out = class.read_ep.address();
        let mut frame = [0; 1024];

        // Closed until configured.
        host.send(out, &[1, 2, 3]);
        class.endpoint_out(out);
        assert!(!class.advance_idle(5_000));
        assert_eq!(class.take_frame(&mut frame), None);

        class.configure();
        host.send(out, &[1, 2, 3]);
        class.endpoint_out(out);
        assert!(class.advance_idle(5_000));
        assert_eq!(class.take_frame(&mut frame), Some(Ok(3)));
        assert_eq!(&frame[..3], &[1, 2, 3]);

        // A reset drops fragments until the next configure.
        class.receive_to_idle();
        UsbClass::reset(&mut class);
        host.send(out, &[9; 4]);
        class.endpoint_out(out);
        assert!(!class.advance_idle(5_000));
        assert_eq!(class.take_frame(&mut frame), None);

        class.configure();
        host.send(out, &[4; 512]);
        class.endpoint_out(out);
        assert!(!class.advance_idle(IDLE_TIMEOUT_US / 2));
        host.send(out, &[5; 10]);
        class.endpoint_out(out);
        assert!(!class.advance_idle(IDLE_TIMEOUT_US / 2));
        assert!(class.advance_idle(IDLE_TIMEOUT_US / 2));
        assert_eq!(class.take_frame(&mut frame), Some(Ok(522)));
        assert_eq!(&frame[510..514], &[4, 4, 5, 5]);
    }

    #[test]
    fn command_ignores_other_endpoints() {
        let alloc = UsbBusAllocator::new(HostBus::default());
        let config = Config::new();
        let mut class: CommandClass<'_, HostBus, Countdown> =
            CommandClass::new(&alloc, &config, Countdown::for_idle(&config));
        let device = UsbDeviceBuilder::new(&alloc, VID_PID).build();
        let host = device.bus();
        let out = class.read_ep.address();
        let inp = class.write_ep.address();
        class.configure();

        host.send(out, &[1]);
        class.endpoint_out(EndpointAddress::from_parts(7, UsbDirection::Out));
        class.endpoint_out(inp);
        assert_eq!(host.queued(), 1);
        assert!(!class.advance_idle(5_000));

        class.endpoint_out(out);
        assert_eq!(host.queued(), 0);
        assert!(class.advance_idle(5_000));
    }

    #[test]
    fn command_response_chunks_and_terminates() {
        let alloc = UsbBusAllocator::new(HostBus::default());
        let config = Config::new();
        let mut class: CommandClass<'_, HostBus, Countdown> =
            CommandClass::new(&alloc, &config, Countdown::for_idle(&config));
        let device = UsbDeviceBuilder::new(&alloc, VID_PID).build();
        let host = device.bus();
        let inp = class.write_ep.address();

        assert_eq!(class.transmit(&[7; 8]), Err(TransmitError::Disabled));
        class.configure();

        class.transmit(&[7; 1024]).unwrap();
        assert_eq!(class.transmit(&[0]), Err(TransmitError::Busy));
        assert_eq!(host.received(inp), [512]);

        // Completions on other endpoints don't advance the transfer.
        class.endpoint_in_complete(EndpointAddress::from_parts(7, UsbDirection::In));
        assert_eq!(host.received(inp), [512]);

        class.endpoint_in_complete(inp);
        assert!(!class.is_transmit_complete());
        class.endpoint_in_complete(inp);
        assert!(class.is_transmit_complete());
        class.endpoint_in_complete(inp);
        assert_eq!(host.received(inp), [512, 512, 0]);

        class.transmit(&[1, 2, 3]).unwrap();
        class.endpoint_in_complete(inp);
        assert!(class.is_transmit_complete());
        assert_eq!(host.received(inp), [512, 512, 0, 3]);
    }

    static STREAMED: AtomicUsize = AtomicUsize::new(0);

    fn streamed(data: &[u8]) {
        STREAMED.fetch_add(data.len(), Ordering::Relaxed);
    }

    #[test]
    fn stream_sends_until_reset() {
        let alloc = UsbBusAllocator::new(HostBus::default());
        let config = Config {
            speed: Speed::LowFull,
            ..Config::new()
        };
        let mut stream: StreamClass<'_, HostBus> =
            StreamClass::new(&alloc, &config).on_complete(streamed);
        let device = UsbDeviceBuilder::new(&alloc, VID_PID).build();
        let host = device.bus();
        let inp = stream.write_ep.address();

        assert_eq!(stream.send(&[1; 10]), Err(TransmitError::Disabled));
        stream.configure();

        stream.send(&[1; 100]).unwrap();
        assert!(stream.is_busy());
        assert_eq!(stream.send(&[2]), Err(TransmitError::Busy));
        stream.endpoint_in_complete(inp);
        stream.endpoint_in_complete(inp);
        assert!(!stream.is_busy());
        assert_eq!(host.received(inp), [64, 36]);
        assert_eq!(STREAMED.load(Ordering::Relaxed), 100);

        stream.send(&[3; 64]).unwrap();
        UsbClass::reset(&mut stream);
        assert!(!stream.is_busy());
        assert_eq!(stream.send(&[3]), Err(TransmitError::Disabled));
        assert_eq!(STREAMED.load(Ordering::Relaxed), 100);
    }
}

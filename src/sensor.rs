//! # DHT22 Temperature and Humidity Sensor
//!
//! The DHT22 talks over a single open-drain data line. The wire protocol
//! (start pulse, response, 40 data bits, checksum) is handled by the
//! `dht_sensor` crate; this module supplies the pin and delay it runs on and
//! turns its reading into whole units.
//!
//! The line is wrapped so that one deadline bounds the whole transaction: once
//! it has passed, every pin read fails. A disconnected or stuck sensor
//! therefore costs at most the configured timeout and shows up as
//! [`EnvironmentReading::Unavailable`].

use std::convert::Infallible;
use std::thread;
use std::time::{Duration, Instant};

use dht_sensor::{dht22, DhtError, DhtReading};
use embedded_hal::blocking::delay::{DelayMs, DelayUs};
use embedded_hal::digital::v2::{InputPin, OutputPin};
use thiserror::Error;

use crate::{EnvironmentReading, Measurement};

/// Anything that yields one temperature/humidity reading per call.
pub trait EnvironmentSensor {
    fn read(&mut self) -> EnvironmentReading;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SensorError {
    /// No answer within the transaction deadline or a protocol wait
    #[error("sensor timed out")]
    Timeout,

    /// Frame arrived but does not add up
    #[error("checksum mismatch")]
    Checksum,
}

impl From<DhtError<SensorError>> for SensorError {
    fn from(e: DhtError<SensorError>) -> Self {
        match e {
            DhtError::PinError(e) => e,
            DhtError::ChecksumMismatch => SensorError::Checksum,
            DhtError::Timeout => SensorError::Timeout,
        }
    }
}

/// Microsecond time base shared by the delay and the deadline check.
pub trait MicroClock {
    fn now_us(&self) -> u64;
}

/// Delay and clock on the monotonic system clock. Microsecond delays spin,
/// since a sleep can overshoot a DHT22 bit by far.
#[derive(Debug, Clone, Copy)]
pub struct BusyWait {
    origin: Instant,
}

impl BusyWait {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for BusyWait {
    fn default() -> Self {
        Self::new()
    }
}

impl MicroClock for BusyWait {
    fn now_us(&self) -> u64 {
        self.origin.elapsed().as_micros() as u64
    }
}

impl DelayUs<u8> for BusyWait {
    fn delay_us(&mut self, us: u8) {
        let until = Instant::now() + Duration::from_micros(u64::from(us));
        while Instant::now() < until {
            std::hint::spin_loop();
        }
    }
}

impl DelayMs<u8> for BusyWait {
    fn delay_ms(&mut self, ms: u8) {
        thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}

/// Data line that fails every read once `deadline` has passed.
struct Bounded<'a, P, C> {
    pin: &'a mut P,
    clock: &'a C,
    deadline: u64,
}

impl<P, C: MicroClock> Bounded<'_, P, C> {
    fn check(&self) -> Result<(), SensorError> {
        if self.clock.now_us() > self.deadline {
            Err(SensorError::Timeout)
        } else {
            Ok(())
        }
    }
}

impl<P, C> InputPin for Bounded<'_, P, C>
where
    P: InputPin<Error = Infallible>,
    C: MicroClock,
{
    type Error = SensorError;

    fn is_high(&self) -> Result<bool, SensorError> {
        self.check()?;
        Ok(self.pin.is_high().unwrap_or_else(|e| match e {}))
    }

    fn is_low(&self) -> Result<bool, SensorError> {
        self.check()?;
        Ok(self.pin.is_low().unwrap_or_else(|e| match e {}))
    }
}

impl<P, C> OutputPin for Bounded<'_, P, C>
where
    P: OutputPin<Error = Infallible>,
{
    type Error = SensorError;

    fn set_low(&mut self) -> Result<(), SensorError> {
        self.pin.set_low().unwrap_or_else(|e| match e {});
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), SensorError> {
        self.pin.set_high().unwrap_or_else(|e| match e {});
        Ok(())
    }
}

/// DHT22 on an open-drain line: `set_low` drives the line, `set_high`
/// releases it to the pull-up.
pub struct Dht22<P, T> {
    pin: P,
    timer: T,
    timeout: Duration,
}

impl<P, T> Dht22<P, T>
where
    P: InputPin<Error = Infallible> + OutputPin<Error = Infallible>,
    T: DelayUs<u8> + DelayMs<u8> + MicroClock + Clone,
{
    pub fn new(pin: P, timer: T, timeout: Duration) -> Self {
        Self {
            pin,
            timer,
            timeout,
        }
    }

    /// Run one full transaction.
    pub fn measure(&mut self) -> Result<Measurement, SensorError> {
        let clock = self.timer.clone();
        let mut line = Bounded {
            pin: &mut self.pin,
            deadline: clock.now_us() + self.timeout.as_micros() as u64,
            clock: &clock,
        };

        let reading = dht22::Reading::read(&mut self.timer, &mut line)?;
        Ok(Measurement {
            temperature: round_tenths(to_tenths(reading.temperature)),
            humidity: round_tenths(to_tenths(reading.relative_humidity)),
        })
    }
}

impl<P, T> EnvironmentSensor for Dht22<P, T>
where
    P: InputPin<Error = Infallible> + OutputPin<Error = Infallible>,
    T: DelayUs<u8> + DelayMs<u8> + MicroClock + Clone,
{
    fn read(&mut self) -> EnvironmentReading {
        match self.measure() {
            Ok(measurement) => {
                log::debug!(
                    "DHT22: {} C, {} %",
                    measurement.temperature,
                    measurement.humidity
                );
                EnvironmentReading::Valid(measurement)
            }
            Err(e) => {
                log::debug!("DHT22 read failed: {}", e);
                EnvironmentReading::Unavailable
            }
        }
    }
}

/// The sensor reports tenths; undo the float conversion without drift.
fn to_tenths(value: f32) -> i32 {
    (value * 10.0).round() as i32
}

/// Tenths to whole units, halves rounded away from zero.
fn round_tenths(tenths: i32) -> i32 {
    if tenths >= 0 {
        (tenths + 5) / 10
    } else {
        (tenths - 5) / 10
    }
}

/// Rate-limits an inner sensor. Between polls the latest result (valid or
/// not) is returned unchanged.
pub struct ThrottledSensor<S> {
    inner: S,
    min_interval: Duration,
    last: Option<(Instant, EnvironmentReading)>,
}

impl<S: EnvironmentSensor> ThrottledSensor<S> {
    pub fn new(inner: S, min_interval: Duration) -> Self {
        Self {
            inner,
            min_interval,
            last: None,
        }
    }

    pub fn read_at(&mut self, now: Instant) -> EnvironmentReading {
        match self.last {
            Some((polled, reading))
                if now.saturating_duration_since(polled) < self.min_interval =>
            {
                reading
            }
            _ => {
                let reading = self.inner.read();
                self.last = Some((now, reading));
                reading
            }
        }
    }
}

impl<S: EnvironmentSensor> EnvironmentSensor for ThrottledSensor<S> {
    fn read(&mut self) -> EnvironmentReading {
        self.read_at(Instant::now())
    }
}

/// Stand-in when no sensor is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableSensor;

impl EnvironmentSensor for UnavailableSensor {
    fn read(&mut self) -> EnvironmentReading {
        EnvironmentReading::Unavailable
    }
}

#[cfg(all(target_os = "linux", feature = "hardware"))]
pub use self::hardware::GpioSensorLine;

#[cfg(all(target_os = "linux", feature = "hardware"))]
mod hardware {
    use crate::error::StartupError;
    use embedded_hal::digital::v2::{InputPin, OutputPin};
    use rppal::gpio::{Gpio, IoPin, Mode, PullUpDown};
    use std::convert::Infallible;

    /// DHT22 data line on a BCM GPIO pin, switched between output and input.
    pub struct GpioSensorLine {
        pin: IoPin,
    }

    impl GpioSensorLine {
        pub fn new(gpio: &Gpio, bcm_pin: u8) -> Result<Self, StartupError> {
            let mut pin = gpio
                .get(bcm_pin)
                .map_err(|e| StartupError::Gpio(format!("sensor pin {}: {}", bcm_pin, e)))?
                .into_io(Mode::Input);
            pin.set_pullupdown(PullUpDown::PullUp);
            Ok(Self { pin })
        }
    }

    impl OutputPin for GpioSensorLine {
        type Error = Infallible;

        fn set_low(&mut self) -> Result<(), Infallible> {
            self.pin.set_mode(Mode::Output);
            self.pin.set_low();
            Ok(())
        }

        /// Release the line; the pull-up or the sensor sets the level.
        fn set_high(&mut self) -> Result<(), Infallible> {
            self.pin.set_mode(Mode::Input);
            Ok(())
        }
    }

    impl InputPin for GpioSensorLine {
        type Error = Infallible;

        fn is_high(&self) -> Result<bool, Infallible> {
            Ok(self.pin.is_high())
        }

        fn is_low(&self) -> Result<bool, Infallible> {
            Ok(self.pin.is_low())
        }
    }
}

use std::fmt;

use chrono::NaiveTime;

pub(crate) mod error;

use error::{Result, ValueSourceError};

/// Controller index of the latitude reading.
pub const LATITUDE_INDEX: u32 = 400;
/// Controller index of the longitude reading.
pub const LONGITUDE_INDEX: u32 = 401;
/// Controller index of the fuel level reading.
pub const FUEL_LEVEL_INDEX: u32 = 402;
/// Controller index of the "train is (mostly) in a tunnel" reading.
pub const IS_IN_TUNNEL_INDEX: u32 = 403;
/// Controller index of the gradient reading.
pub const GRADIENT_INDEX: u32 = 404;
/// Controller index of the heading reading.
pub const HEADING_INDEX: u32 = 405;
/// Controller indexes of the in-game clock, as `[hour, minute, second]`.
pub const CLOCK_INDEXES: [u32; 3] = [406, 407, 408];

/// Delimiter between the provider, product and engine parts of the raw loco name.
pub const LOCO_NAME_DELIMITER: &str = ".:.";

/// Which of the three values RailDriver keeps per controller should be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Current,
    Min,
    Max,
}

impl ValueKind {
    /// Returns the raw value type code expected by RailDriver.
    pub const fn as_raw(&self) -> i32 {
        match self {
            Self::Current => 0,
            Self::Min => 1,
            Self::Max => 2,
        }
    }
}

/// Reference to a controller, either by its index or by its name.
///
/// Reading by index is considerably cheaper, since every name lookup scans the controller list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerRef<'a> {
    Index(u32),
    Name(&'a str),
}

impl From<u32> for ControllerRef<'_> {
    fn from(value: u32) -> Self {
        Self::Index(value)
    }
}

impl<'a> From<&'a str> for ControllerRef<'a> {
    fn from(value: &'a str) -> Self {
        Self::Name(value)
    }
}

impl<'a> From<&'a String> for ControllerRef<'a> {
    fn from(value: &'a String) -> Self {
        Self::Name(value.as_str())
    }
}

impl fmt::Display for ControllerRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "#{index}"),
            Self::Name(name) => write!(f, "{name}"),
        }
    }
}

/// Geographic position of the train.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.lat, self.lon)
    }
}

/// Provider, product and engine name of the currently driven loco.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocoName {
    pub provider: String,
    pub product: String,
    pub engine: String,
}

impl LocoName {
    /// Parses the raw `provider.:.product.:.engine` string.
    ///
    /// Returns `Ok(None)` for an empty string, which RailDriver reports while no loco is loaded.
    pub fn parse(raw: &str) -> Result<Option<Self>> {
        if raw.is_empty() {
            return Ok(None);
        }

        let mut parts = raw.split(LOCO_NAME_DELIMITER);
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(provider), Some(product), Some(engine), None) => Ok(Some(Self {
                provider: provider.to_string(),
                product: product.to_string(),
                engine: engine.to_string(),
            })),
            _ => Err(ValueSourceError::MalformedLocoName {
                raw: raw.to_string(),
            }),
        }
    }

    /// Returns the name parts in `[provider, product, engine]` order.
    pub fn into_parts(self) -> Vec<String> {
        vec![self.provider, self.product, self.engine]
    }
}

impl fmt::Display for LocoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {} / {}", self.provider, self.product, self.engine)
    }
}

/// Read access to the controller values of a running simulator.
///
/// This is the only capability the [`Listener`](crate::listener::Listener) depends on.
/// [`RailDriver`](crate::driver::RailDriver) is the production implementation; anything able to
/// resolve controllers and read their current values can stand in for it.
///
/// Only [`read`](Self::read), [`enumerate`](Self::enumerate) and
/// [`raw_loco_name`](Self::raw_loco_name) are required. The special getters are composed from
/// reads at the fixed controller indexes.
pub trait ValueSource: Send + Sync + 'static {
    /// Reads the current value of a controller.
    ///
    /// Must fail with an error for which [`ValueSourceError::is_not_found`] holds when the
    /// controller is not currently valid.
    fn read(&self, controller: ControllerRef<'_>) -> Result<f64>;

    /// Returns the `(index, name)` pairs of the currently valid controllers. May be empty.
    fn enumerate(&self) -> Result<Vec<(u32, String)>>;

    /// Returns the raw `provider.:.product.:.engine` loco name, empty if no loco is loaded.
    fn raw_loco_name(&self) -> Result<String>;

    /// Resolves a controller name to its index by scanning [`enumerate`](Self::enumerate).
    fn name_to_index(&self, name: &str) -> Result<u32> {
        self.enumerate()?
            .into_iter()
            .find_map(|(index, n)| (n == name).then_some(index))
            .ok_or_else(|| ValueSourceError::ControllerNotFound {
                name: name.to_string(),
            })
    }

    /// Returns the current `(lat, lon)` position of the train.
    fn coordinates(&self) -> Result<Coordinates> {
        Ok(Coordinates {
            lat: self.read(LATITUDE_INDEX.into())?,
            lon: self.read(LONGITUDE_INDEX.into())?,
        })
    }

    fn fuel_level(&self) -> Result<f64> {
        self.read(FUEL_LEVEL_INDEX.into())
    }

    fn gradient(&self) -> Result<f64> {
        self.read(GRADIENT_INDEX.into())
    }

    fn heading(&self) -> Result<f64> {
        self.read(HEADING_INDEX.into())
    }

    /// Returns `true` if the train is currently (mostly) in a tunnel.
    fn is_in_tunnel(&self) -> Result<bool> {
        Ok(self.read(IS_IN_TUNNEL_INDEX.into())? != 0.0)
    }

    /// Returns the provider, product and engine name of the loco, or `None` if none is loaded.
    fn loco_name(&self) -> Result<Option<LocoName>> {
        LocoName::parse(&self.raw_loco_name()?)
    }

    /// Returns the in-game wall-clock time.
    ///
    /// Fails with [`ValueSourceError::InvalidClockTime`] if any reading is not a finite value
    /// within its range.
    fn clock_time(&self) -> Result<NaiveTime> {
        let [hour, minute, second] = CLOCK_INDEXES;
        let hour = self.read(hour.into())?;
        let minute = self.read(minute.into())?;
        let second = self.read(second.into())?;

        // Fractional parts are truncated, matching how the simulator reports whole units
        let whole = |reading: f64| {
            (reading.is_finite() && reading > -1.0 && reading < f64::from(u32::MAX))
                .then(|| reading as u32)
        };

        whole(hour)
            .zip(whole(minute))
            .zip(whole(second))
            .and_then(|((h, m), s)| NaiveTime::from_hms_opt(h, m, s))
            .ok_or(ValueSourceError::InvalidClockTime {
                hour,
                minute,
                second,
            })
    }
}

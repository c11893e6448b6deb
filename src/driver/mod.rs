use std::{fmt, sync::Arc};

use tracing::debug;

use crate::source::{
    ControllerRef, ValueKind, ValueSource,
    error::{Result, ValueSourceError},
};

/// Separator between controller names in the raw controller list.
pub const CONTROLLER_LIST_DELIMITER: &str = "::";

/// Raw entry points exported by the RailDriver plugin library.
///
/// Implementations wrap the native `raildriver.dll` (or a stand-in for it). Locating and loading
/// the library is left to the implementor. All methods map one-to-one to the native exports.
pub trait RailDriverApi: Send + Sync + 'static {
    /// `GetControllerList`: controller names joined by `::`, empty when not ready.
    fn controller_list(&self) -> Result<String>;

    /// `GetControllerValue`: value of the given kind for the controller at `index`.
    fn controller_value(&self, index: u32, kind: ValueKind) -> Result<f32>;

    /// `GetLocoName`: `provider.:.product.:.engine`, empty when no loco is loaded.
    fn loco_name(&self) -> Result<String>;

    /// `SetControllerValue`.
    fn set_controller_value(&self, index: u32, value: f32) -> Result<()>;

    /// `SetRailDriverConnected`.
    fn set_rail_driver_connected(&self, connected: bool) -> Result<()>;
}

/// High level access to Train Simulator controllers through RailDriver.
///
/// Resolves controller names to indexes and composes the special readings (coordinates, clock
/// time, loco name, ...) out of raw reads. `RailDriver` implements [`ValueSource`], so it can be
/// handed directly to a [`Listener`](crate::listener::Listener).
///
/// Note that [`set_rail_driver_connected`](Self::set_rail_driver_connected) must be called with
/// `true` before the simulator starts exchanging data.
#[derive(Clone)]
pub struct RailDriver {
    api: Arc<dyn RailDriverApi>,
}

impl RailDriver {
    pub fn new(api: Arc<dyn RailDriverApi>) -> Self {
        Self { api }
    }

    /// Returns the `(index, controller_name)` pairs of the currently valid controllers.
    ///
    /// Indexes start at 0. Returns an empty list while the simulator is not ready.
    pub fn controller_list(&self) -> Result<Vec<(u32, String)>> {
        let raw = self.api.controller_list()?;
        if raw.is_empty() {
            return Ok(Vec::new());
        }

        Ok((0u32..)
            .zip(raw.split(CONTROLLER_LIST_DELIMITER).map(str::to_string))
            .collect())
    }

    /// Returns the index of the controller called `name`.
    pub fn controller_index(&self, name: &str) -> Result<u32> {
        self.controller_list()?
            .into_iter()
            .find_map(|(index, n)| (n == name).then_some(index))
            .ok_or_else(|| ValueSourceError::ControllerNotFound {
                name: name.to_string(),
            })
    }

    fn resolve(&self, controller: ControllerRef<'_>) -> Result<u32> {
        match controller {
            ControllerRef::Index(index) => Ok(index),
            ControllerRef::Name(name) => self.controller_index(name),
        }
    }

    /// Returns the current, minimum or maximum value of a controller.
    ///
    /// Querying by index is much cheaper than by name. When polling frequently, resolve names
    /// once with [`controller_list`](Self::controller_list) and keep the indexes.
    pub fn controller_value<'a>(
        &self,
        controller: impl Into<ControllerRef<'a>>,
        kind: ValueKind,
    ) -> Result<f64> {
        let index = self.resolve(controller.into())?;
        self.api.controller_value(index, kind).map(f64::from)
    }

    pub fn current_controller_value<'a>(
        &self,
        controller: impl Into<ControllerRef<'a>>,
    ) -> Result<f64> {
        self.controller_value(controller, ValueKind::Current)
    }

    pub fn min_controller_value<'a>(&self, controller: impl Into<ControllerRef<'a>>) -> Result<f64> {
        self.controller_value(controller, ValueKind::Min)
    }

    pub fn max_controller_value<'a>(&self, controller: impl Into<ControllerRef<'a>>) -> Result<f64> {
        self.controller_value(controller, ValueKind::Max)
    }

    /// Sets the value of a controller.
    pub fn set_controller_value<'a>(
        &self,
        controller: impl Into<ControllerRef<'a>>,
        value: f32,
    ) -> Result<()> {
        let controller = controller.into();
        let index = self.resolve(controller)?;

        debug!(%controller, index, value, "setting controller value");

        self.api.set_controller_value(index, value)
    }

    /// Starts (`true`) or stops (`false`) exchanging data with Train Simulator.
    pub fn set_rail_driver_connected(&self, connected: bool) -> Result<()> {
        debug!(connected, "setting RailDriver connection");

        self.api.set_rail_driver_connected(connected)
    }
}

impl fmt::Debug for RailDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RailDriver").finish_non_exhaustive()
    }
}

impl ValueSource for RailDriver {
    fn read(&self, controller: ControllerRef<'_>) -> Result<f64> {
        self.current_controller_value(controller)
    }

    fn enumerate(&self) -> Result<Vec<(u32, String)>> {
        self.controller_list()
    }

    fn raw_loco_name(&self) -> Result<String> {
        self.api.loco_name()
    }

    fn name_to_index(&self, name: &str) -> Result<u32> {
        self.controller_index(name)
    }
}

//! BLE link adapter.
//!
//! Implements [`TransportPort`] over a GATT server: telemetry frames go out
//! as notifications, and the control characteristic feeds
//! [`LINK_EVENTS`](crate::events::LINK_EVENTS).
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: Bluedroid GATT server via raw `esp_idf_svc::sys` calls.
//! - **all other targets**: simulation that records frames for host-side tests.
//!
//! ## GATT Service Layout
//!
//! | Characteristic | UUID                                   | Props          |
//! |----------------|----------------------------------------|----------------|
//! | Frames         | `0000deb1-0000-1000-8000-00805f9b34fb` | Notify (+CCCD) |
//! | Control        | `0000deb2-0000-1000-8000-00805f9b34fb` | Write          |
//!
//! Service: `6e400001-b5a3-f393-e0a9-e50e24dcca9e`.  The service UUID is
//! advertised, the device name goes in the scan response.

use log::info;

use crate::app::ports::TransportPort;
use crate::error::CommsError;

#[cfg(not(target_os = "espidf"))]
use crate::events::LinkEventQueue;

// ───────────────────────────────────────────────────────────────
// Constants
// ───────────────────────────────────────────────────────────────

pub const SERVICE_UUID: u128 = 0x6e400001_b5a3_f393_e0a9_e50e24dcca9e;
pub const CHAR_FRAMES: u128 = 0x0000deb1_0000_1000_8000_00805f9b34fb;
pub const CHAR_CONTROL: u128 = 0x0000deb2_0000_1000_8000_00805f9b34fb;

/// Client Characteristic Configuration descriptor.
pub const CCCD_UUID16: u16 = 0x2902;

/// Largest ATT MTU we offer; frames need ≥ chunk limit + 3.
pub const LOCAL_MTU: u16 = 517;

/// Settle time before re-advertising after a disconnect.
pub const READVERTISE_DELAY_MS: u64 = 100;

// ───────────────────────────────────────────────────────────────
// BLE state
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BleState {
    Idle,
    Advertising,
    Connected,
    Failed,
}

// ── ESP-IDF BLE static state (ISR-safe atomics) ───────────────
//
// Bluedroid callbacks are C function pointers that cannot capture Rust
// closures. These atomics bridge the callback context to the adapter.

#[cfg(target_os = "espidf")]
use core::sync::atomic::{AtomicBool, AtomicU8, AtomicU16, Ordering as AtomicOrdering};

#[cfg(target_os = "espidf")]
static BLE_GATTS_IF: AtomicU8 = AtomicU8::new(0);
#[cfg(target_os = "espidf")]
static BLE_CONN_ID: AtomicU16 = AtomicU16::new(0);
#[cfg(target_os = "espidf")]
static BLE_CONNECTED: AtomicBool = AtomicBool::new(false);
#[cfg(target_os = "espidf")]
static BLE_NOTIFY_ENABLED: AtomicBool = AtomicBool::new(false);
#[cfg(target_os = "espidf")]
static BLE_SVC_HANDLE: AtomicU16 = AtomicU16::new(0);
#[cfg(target_os = "espidf")]
static BLE_FRAMES_HANDLE: AtomicU16 = AtomicU16::new(0);
#[cfg(target_os = "espidf")]
static BLE_CCCD_HANDLE: AtomicU16 = AtomicU16::new(0);
#[cfg(target_os = "espidf")]
static BLE_CONTROL_HANDLE: AtomicU16 = AtomicU16::new(0);
/// Advertising starts once both adv and scan-response data are set.
#[cfg(target_os = "espidf")]
static BLE_ADV_PENDING: AtomicU8 = AtomicU8::new(0);
#[cfg(target_os = "espidf")]
const ADV_DATA_PENDING: u8 = 1 << 0;
#[cfg(target_os = "espidf")]
const SCAN_RSP_PENDING: u8 = 1 << 1;

#[cfg(target_os = "espidf")]
static SERVICE_UUID_LE: [u8; 16] = SERVICE_UUID.to_le_bytes();

#[cfg(target_os = "espidf")]
fn uuid128_to_esp(uuid: u128) -> esp_idf_svc::sys::esp_bt_uuid_t {
    // SAFETY: all-zero is a valid esp_bt_uuid_t; the union arm is then set.
    let mut t: esp_idf_svc::sys::esp_bt_uuid_t = unsafe { core::mem::zeroed() };
    t.len = 16;
    t.uuid.uuid128 = uuid.to_le_bytes();
    t
}

#[cfg(target_os = "espidf")]
fn uuid16_to_esp(uuid: u16) -> esp_idf_svc::sys::esp_bt_uuid_t {
    // SAFETY: as above.
    let mut t: esp_idf_svc::sys::esp_bt_uuid_t = unsafe { core::mem::zeroed() };
    t.len = 2;
    t.uuid.uuid16 = uuid;
    t
}

#[cfg(target_os = "espidf")]
fn adv_params() -> esp_idf_svc::sys::esp_ble_adv_params_t {
    use esp_idf_svc::sys::*;
    esp_ble_adv_params_t {
        adv_int_min: 0x20,
        adv_int_max: 0x40,
        adv_type: esp_ble_adv_type_t_ADV_TYPE_IND,
        own_addr_type: esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
        channel_map: esp_ble_adv_channel_t_ADV_CHNL_ALL,
        adv_filter_policy: esp_ble_adv_filter_t_ADV_FILTER_ALLOW_SCAN_ANY_CON_ANY,
        // SAFETY: remaining fields (peer address) are plain data.
        ..unsafe { core::mem::zeroed() }
    }
}

#[cfg(target_os = "espidf")]
fn start_advertising() {
    let mut params = adv_params();
    // SAFETY: params lives across the call; the stack copies it.
    let ret = unsafe { esp_idf_svc::sys::esp_ble_gap_start_advertising(&mut params) };
    if ret != esp_idf_svc::sys::ESP_OK as i32 {
        log::warn!("BLE GAP: start advertising failed ({})", ret);
    }
}

/// Advertise the service UUID; put the name in the scan response.
#[cfg(target_os = "espidf")]
unsafe fn configure_adv_data() {
    use esp_idf_svc::sys::*;
    BLE_ADV_PENDING.store(ADV_DATA_PENDING | SCAN_RSP_PENDING, AtomicOrdering::Relaxed);

    let flag = (ESP_BLE_ADV_FLAG_GEN_DISC | ESP_BLE_ADV_FLAG_BREDR_NOT_SPT) as u8;
    let mut adv = esp_ble_adv_data_t {
        set_scan_rsp: false,
        include_name: false,
        include_txpower: false,
        min_interval: 0x0006,
        max_interval: 0x0010,
        service_uuid_len: SERVICE_UUID_LE.len() as u16,
        p_service_uuid: SERVICE_UUID_LE.as_ptr().cast_mut(),
        flag,
        // SAFETY: remaining pointer/len pairs are null/zero.
        ..unsafe { core::mem::zeroed() }
    };
    let mut scan_rsp = esp_ble_adv_data_t {
        set_scan_rsp: true,
        include_name: true,
        flag,
        // SAFETY: as above.
        ..unsafe { core::mem::zeroed() }
    };
    // SAFETY: both structs outlive the calls; the stack copies the data.
    unsafe {
        esp_ble_gap_config_adv_data(&mut adv);
        esp_ble_gap_config_adv_data(&mut scan_rsp);
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn ble_gap_event_handler(
    event: esp_idf_svc::sys::esp_gap_ble_cb_event_t,
    _param: *mut esp_idf_svc::sys::esp_ble_gap_cb_param_t,
) {
    use esp_idf_svc::sys::*;
    let clear = |bit: u8| {
        let before = BLE_ADV_PENDING.fetch_and(!bit, AtomicOrdering::Relaxed);
        if before & !bit == 0 && before != 0 {
            start_advertising();
        }
    };
    match event {
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_DATA_SET_COMPLETE_EVT => clear(ADV_DATA_PENDING),
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_SCAN_RSP_DATA_SET_COMPLETE_EVT => {
            clear(SCAN_RSP_PENDING);
        }
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_START_COMPLETE_EVT => {
            log::info!("BLE GAP: advertising started");
        }
        esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_STOP_COMPLETE_EVT => {
            log::info!("BLE GAP: advertising stopped");
        }
        _ => {}
    }
}

#[cfg(target_os = "espidf")]
unsafe fn add_gatt_char(svc_handle: u16, uuid: u128, perm: u32, prop: u32) {
    use esp_idf_svc::sys::*;
    let mut char_uuid = uuid128_to_esp(uuid);
    // SAFETY: char_uuid outlives the call; null value/control = app response.
    unsafe {
        esp_ble_gatts_add_char(
            svc_handle,
            &mut char_uuid,
            perm as esp_gatt_perm_t,
            prop as esp_gatt_char_prop_t,
            core::ptr::null_mut(),
            core::ptr::null_mut(),
        );
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn ble_gatts_event_handler(
    event: esp_idf_svc::sys::esp_gatts_cb_event_t,
    gatts_if: esp_idf_svc::sys::esp_gatt_if_t,
    param: *mut esp_idf_svc::sys::esp_ble_gatts_cb_param_t,
) {
    use esp_idf_svc::sys::*;

    match event {
        esp_gatts_cb_event_t_ESP_GATTS_REG_EVT => {
            BLE_GATTS_IF.store(gatts_if, AtomicOrdering::Relaxed);
            log::info!("BLE GATTS: app registered (if={})", gatts_if);
            let mut svc_id = esp_gatt_srvc_id_t {
                id: esp_gatt_id_t {
                    uuid: uuid128_to_esp(SERVICE_UUID),
                    inst_id: 0,
                },
                is_primary: true,
            };
            // SAFETY: svc_id outlives the calls.
            unsafe {
                configure_adv_data();
                // service + 2 chars (2 handles each) + CCCD
                esp_ble_gatts_create_service(gatts_if, &mut svc_id, 8);
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_CREATE_EVT => {
            // SAFETY: the stack passes a valid param for this event.
            let svc_handle = unsafe { (*param).create.service_handle };
            BLE_SVC_HANDLE.store(svc_handle, AtomicOrdering::Relaxed);
            log::info!("BLE GATTS: service created (handle={})", svc_handle);
            // SAFETY: handle was just created by the stack.
            unsafe {
                esp_ble_gatts_start_service(svc_handle);
                add_gatt_char(
                    svc_handle,
                    CHAR_FRAMES,
                    ESP_GATT_PERM_READ,
                    ESP_GATT_CHAR_PROP_BIT_NOTIFY,
                );
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_EVT => {
            // SAFETY: valid param for this event.
            let (handle, uuid) = unsafe {
                let p = &(*param).add_char;
                (p.attr_handle, p.char_uuid.uuid.uuid128)
            };
            let svc_handle = BLE_SVC_HANDLE.load(AtomicOrdering::Relaxed);
            if uuid == CHAR_FRAMES.to_le_bytes() {
                BLE_FRAMES_HANDLE.store(handle, AtomicOrdering::Relaxed);
                log::info!("BLE GATTS: frames char (handle={})", handle);
                let mut cccd = uuid16_to_esp(CCCD_UUID16);
                // SAFETY: cccd outlives the call.
                unsafe {
                    esp_ble_gatts_add_char_descr(
                        svc_handle,
                        &mut cccd,
                        (ESP_GATT_PERM_READ | ESP_GATT_PERM_WRITE) as esp_gatt_perm_t,
                        core::ptr::null_mut(),
                        core::ptr::null_mut(),
                    );
                }
            } else if uuid == CHAR_CONTROL.to_le_bytes() {
                BLE_CONTROL_HANDLE.store(handle, AtomicOrdering::Relaxed);
                log::info!("BLE GATTS: control char (handle={}), all registered", handle);
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_DESCR_EVT => {
            // SAFETY: valid param for this event.
            let handle = unsafe { (*param).add_char_descr.attr_handle };
            BLE_CCCD_HANDLE.store(handle, AtomicOrdering::Relaxed);
            let svc_handle = BLE_SVC_HANDLE.load(AtomicOrdering::Relaxed);
            // SAFETY: service is started.
            unsafe {
                add_gatt_char(
                    svc_handle,
                    CHAR_CONTROL,
                    ESP_GATT_PERM_WRITE,
                    ESP_GATT_CHAR_PROP_BIT_WRITE | ESP_GATT_CHAR_PROP_BIT_WRITE_NR,
                );
            }
        }
        esp_gatts_cb_event_t_ESP_GATTS_CONNECT_EVT => {
            // SAFETY: valid param for this event.
            let conn_id = unsafe { (*param).connect.conn_id };
            BLE_CONN_ID.store(conn_id, AtomicOrdering::Relaxed);
            BLE_CONNECTED.store(true, AtomicOrdering::Relaxed);
            log::info!("BLE GATTS: central connected (conn_id={})", conn_id);
        }
        esp_gatts_cb_event_t_ESP_GATTS_DISCONNECT_EVT => {
            BLE_CONNECTED.store(false, AtomicOrdering::Relaxed);
            BLE_NOTIFY_ENABLED.store(false, AtomicOrdering::Relaxed);
            log::info!("BLE GATTS: central disconnected");
            crate::events::LINK_EVENTS.push_disconnect();
        }
        esp_gatts_cb_event_t_ESP_GATTS_MTU_EVT => {
            // SAFETY: valid param for this event.
            let mtu = unsafe { (*param).mtu.mtu };
            log::info!("BLE GATTS: MTU {}", mtu);
        }
        esp_gatts_cb_event_t_ESP_GATTS_WRITE_EVT => {
            // SAFETY: valid param for this event; value/len describe the
            // written bytes for the duration of the callback.
            let p = unsafe { &(*param).write };
            let data = unsafe { core::slice::from_raw_parts(p.value, usize::from(p.len)) };

            if p.handle == BLE_CONTROL_HANDLE.load(AtomicOrdering::Relaxed) {
                crate::events::LINK_EVENTS.push_control_write(data);
            } else if p.handle == BLE_CCCD_HANDLE.load(AtomicOrdering::Relaxed) {
                let enabled = data.first().is_some_and(|b| b & 0x01 != 0);
                BLE_NOTIFY_ENABLED.store(enabled, AtomicOrdering::Relaxed);
                log::info!("BLE GATTS: notifications {}", if enabled { "on" } else { "off" });
            }

            if p.need_rsp && !p.is_prep {
                // SAFETY: conn/trans ids come from this event.
                unsafe {
                    esp_ble_gatts_send_response(
                        gatts_if,
                        p.conn_id,
                        p.trans_id,
                        esp_gatt_status_t_ESP_GATT_OK,
                        core::ptr::null_mut(),
                    );
                }
            }
        }
        _ => {}
    }
}

// ───────────────────────────────────────────────────────────────
// BLE adapter
// ───────────────────────────────────────────────────────────────

/// GATT server carrying the telemetry stream.
pub struct BleLink {
    state: BleState,
    device_name: heapless::String<24>,
    #[cfg(not(target_os = "espidf"))]
    sim: SimLink,
}

/// Simulation: what a central would have seen.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Default)]
struct SimLink {
    frames: Vec<Vec<u8>>,
    subscribed: bool,
    adverts: usize,
}

impl BleLink {
    pub fn new(device_name: heapless::String<24>) -> Self {
        Self {
            state: BleState::Idle,
            device_name,
            #[cfg(not(target_os = "espidf"))]
            sim: SimLink::default(),
        }
    }

    pub fn state(&self) -> BleState {
        self.state
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Bring up the stack and start advertising.
    pub fn start(&mut self) -> Result<(), CommsError> {
        info!("BLE: starting as '{}'", self.device_name);
        match self.platform_start() {
            Ok(()) => {
                self.state = BleState::Advertising;
                Ok(())
            }
            Err(e) => {
                self.state = BleState::Failed;
                Err(e)
            }
        }
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_start(&mut self) -> Result<(), CommsError> {
        use esp_idf_svc::sys::*;

        let check = |what: &str, ret: i32| {
            if ret == ESP_OK as i32 {
                Ok(())
            } else {
                log::error!("BLE: {} failed ({})", what, ret);
                Err(CommsError::StackInitFailed)
            }
        };

        // Null-terminated copy for the C API.
        let mut name = heapless::Vec::<u8, 25>::new();
        let _ = name.extend_from_slice(self.device_name.as_bytes());
        let _ = name.push(0);

        // SAFETY: called once from the main task before any callback runs.
        unsafe {
            // Release classic BT memory (BLE-only mode saves ~30 KB).
            esp_bt_controller_mem_release(esp_bt_mode_t_ESP_BT_MODE_CLASSIC_BT);

            let mut bt_cfg = esp_bt_controller_config_t::default();
            check("bt_controller_init", esp_bt_controller_init(&mut bt_cfg))?;
            check(
                "bt_controller_enable",
                esp_bt_controller_enable(esp_bt_mode_t_ESP_BT_MODE_BLE),
            )?;
            check("bluedroid_init", esp_bluedroid_init())?;
            check("bluedroid_enable", esp_bluedroid_enable())?;

            check(
                "gap_register_callback",
                esp_ble_gap_register_callback(Some(ble_gap_event_handler)),
            )?;
            check(
                "gatts_register_callback",
                esp_ble_gatts_register_callback(Some(ble_gatts_event_handler)),
            )?;
            check("set_device_name", esp_ble_gap_set_device_name(name.as_ptr().cast()))?;
            check("set_local_mtu", esp_ble_gatt_set_local_mtu(LOCAL_MTU))?;
            // Advertising starts from the GAP callback once the data is set.
            check("gatts_app_register", esp_ble_gatts_app_register(0))?;
        }

        info!(
            "BLE(espidf): Bluedroid stack initialized as '{}'",
            self.device_name
        );
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_start(&mut self) -> Result<(), CommsError> {
        info!(
            "BLE(sim): advertising '{}' (service {:032x})",
            self.device_name, SERVICE_UUID
        );
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_notify(&mut self, frame: &[u8]) -> Result<(), CommsError> {
        use esp_idf_svc::sys::*;

        if !BLE_CONNECTED.load(AtomicOrdering::Relaxed) {
            self.state = BleState::Advertising;
            return Err(CommsError::NotConnected);
        }
        self.state = BleState::Connected;
        if !BLE_NOTIFY_ENABLED.load(AtomicOrdering::Relaxed) {
            return Err(CommsError::NotConnected);
        }

        // SAFETY: frame outlives the call; the stack copies the payload.
        let ret = unsafe {
            esp_ble_gatts_send_indicate(
                BLE_GATTS_IF.load(AtomicOrdering::Relaxed),
                BLE_CONN_ID.load(AtomicOrdering::Relaxed),
                BLE_FRAMES_HANDLE.load(AtomicOrdering::Relaxed),
                frame.len() as u16,
                frame.as_ptr().cast_mut(),
                false,
            )
        };
        if ret != ESP_OK as i32 {
            return Err(CommsError::NotifyFailed);
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_notify(&mut self, frame: &[u8]) -> Result<(), CommsError> {
        if self.state != BleState::Connected || !self.sim.subscribed {
            return Err(CommsError::NotConnected);
        }
        self.sim.frames.push(frame.to_vec());
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_restart_advertising(&mut self) {
        // Give the stack time to tear down the old connection.
        std::thread::sleep(core::time::Duration::from_millis(READVERTISE_DELAY_MS));
        start_advertising();
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_restart_advertising(&mut self) {
        self.sim.adverts += 1;
        info!("BLE(sim): advertising restarted");
    }
}

// ── Simulation hooks ──────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl BleLink {
    /// A central connects and subscribes to the frames characteristic.
    pub fn sim_connect(&mut self) {
        self.state = BleState::Connected;
        self.sim.subscribed = true;
    }

    /// A central writes the control characteristic.
    pub fn sim_control_write(&self, events: &LinkEventQueue, data: &[u8]) -> bool {
        events.push_control_write(data)
    }

    /// The central drops the link.
    pub fn sim_disconnect(&mut self, events: &LinkEventQueue) {
        self.state = BleState::Advertising;
        self.sim.subscribed = false;
        events.push_disconnect();
    }

    /// Frames notified so far.
    pub fn sim_frames(&self) -> &[Vec<u8>] {
        &self.sim.frames
    }

    pub fn sim_take_frames(&mut self) -> Vec<Vec<u8>> {
        core::mem::take(&mut self.sim.frames)
    }

    /// Times advertising was restarted.
    pub fn sim_adverts(&self) -> usize {
        self.sim.adverts
    }
}

// ───────────────────────────────────────────────────────────────
// TransportPort implementation
// ───────────────────────────────────────────────────────────────

impl TransportPort for BleLink {
    fn notify(&mut self, frame: &[u8]) -> Result<(), CommsError> {
        self.platform_notify(frame)
    }

    fn restart_advertising(&mut self) {
        self.platform_restart_advertising();
        self.state = BleState::Advertising;
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────

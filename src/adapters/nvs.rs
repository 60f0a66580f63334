//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`PatternStore`] for the trainer.  The pattern is stored as a
//! postcard-encoded ordered byte list under namespace `pokayoke`, key
//! `pattern`.  ESP-IDF NVS commits are atomic per `nvs_commit()`, so a
//! power loss mid-save leaves the previous pattern in place.
//!
//! The store does not validate what it holds; that is
//! [`Pattern::from_slice`](crate::pattern::Pattern::from_slice)'s job on
//! load.

use crate::app::ports::{PatternStore, StorageError};
use log::info;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
#[cfg(target_os = "espidf")]
use log::warn;

const PATTERN_NAMESPACE: &str = "pokayoke";
const PATTERN_KEY: &str = "pattern";

/// Upper bound on the encoded blob: eight channels plus a length varint.
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
const MAX_BLOB_SIZE: usize = 16;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Create a new NvsAdapter and initialise NVS flash.
    ///
    /// Returns `Err(StorageError::IoError)` if flash initialisation fails
    /// unrecoverably. On first boot or after a version mismatch the NVS
    /// partition is erased and re-initialised automatically.
    pub fn new() -> Result<Self, StorageError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
            // single main-task context before any concurrent NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(StorageError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(StorageError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(StorageError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    /// An adapter that skips flash initialisation.  Used when `new()`
    /// fails: on the device every access then reports an error and the
    /// session runs on the default pattern without persistence.
    pub fn unavailable() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    /// Open an NVS namespace, execute a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let mut ns_buf = [0u8; 16];
        let ns_bytes = namespace.as_bytes();
        let len = ns_bytes.len().min(15);
        ns_buf[..len].copy_from_slice(&ns_bytes[..len]);

        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(ns_buf.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }

    /// Forget the stored pattern; the next boot uses the default.
    pub fn erase_pattern(&mut self) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let key = Self::composite_key(PATTERN_NAMESPACE, PATTERN_KEY);
            self.store.borrow_mut().remove(&key);
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(PATTERN_NAMESPACE, true, |handle| {
                let ret = unsafe { nvs_erase_key(handle, b"pattern\0".as_ptr() as *const _) };
                if ret != ESP_OK && ret != ESP_ERR_NVS_NOT_FOUND {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            result.map_err(|_| StorageError::IoError)
        }
    }

    /// Store a raw blob in place of the encoded pattern (diagnostics).
    #[cfg(not(target_os = "espidf"))]
    pub fn put_raw(&mut self, bytes: &[u8]) {
        let key = Self::composite_key(PATTERN_NAMESPACE, PATTERN_KEY);
        self.store.borrow_mut().insert(key, bytes.to_vec());
    }
}

impl PatternStore for NvsAdapter {
    fn load_pattern(&self) -> Result<Option<Vec<u8>>, StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let key = Self::composite_key(PATTERN_NAMESPACE, PATTERN_KEY);
            match self.store.borrow().get(&key) {
                Some(bytes) => {
                    let channels: Vec<u8> =
                        postcard::from_bytes(bytes).map_err(|_| StorageError::Corrupted)?;
                    Ok(Some(channels))
                }
                None => Ok(None),
            }
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(PATTERN_NAMESPACE, false, |handle| {
                let key_cstr = b"pattern\0";
                let mut buf = [0u8; MAX_BLOB_SIZE];
                let mut size = buf.len();
                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        key_cstr.as_ptr() as *const _,
                        buf.as_mut_ptr() as *mut _,
                        &mut size,
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(buf[..size].to_vec())
            });

            match result {
                Ok(bytes) => {
                    let channels: Vec<u8> =
                        postcard::from_bytes(&bytes).map_err(|_| StorageError::Corrupted)?;
                    info!("NvsAdapter: loaded pattern ({} bytes)", bytes.len());
                    Ok(Some(channels))
                }
                // A missing namespace or key both mean "never saved".
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Ok(None),
                Err(e) => {
                    warn!("NvsAdapter: NVS read error {}", e);
                    Err(StorageError::IoError)
                }
            }
        }
    }

    fn save_pattern(&mut self, channels: &[u8]) -> Result<(), StorageError> {
        let bytes = postcard::to_allocvec(channels).map_err(|_| StorageError::IoError)?;

        #[cfg(not(target_os = "espidf"))]
        {
            let key = Self::composite_key(PATTERN_NAMESPACE, PATTERN_KEY);
            self.store.borrow_mut().insert(key, bytes);
            info!("NvsAdapter: pattern saved (simulation)");
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            if bytes.len() > MAX_BLOB_SIZE {
                return Err(StorageError::Full);
            }
            let result = Self::with_nvs_handle(PATTERN_NAMESPACE, true, |handle| {
                let key_cstr = b"pattern\0";
                let ret = unsafe {
                    nvs_set_blob(
                        handle,
                        key_cstr.as_ptr() as *const _,
                        bytes.as_ptr() as *const _,
                        bytes.len(),
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            match result {
                Ok(()) => {
                    info!("NvsAdapter: pattern saved to NVS ({} bytes)", bytes.len());
                    Ok(())
                }
                Err(e) if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE => Err(StorageError::Full),
                Err(e) => {
                    warn!("NvsAdapter: NVS write error {}", e);
                    Err(StorageError::IoError)
                }
            }
        }
    }
}

//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter    | Implements                  | Connects to              |
//! |------------|-----------------------------|--------------------------|
//! | `hardware` | AnalogInput                 | ESP32 ADC1               |
//! |            | DigitalOutput, DigitalInput | ESP32 GPIO (embedded-hal)|
//! | `mqtt`     | Transport                   | ESP-IDF MQTT client      |
//! | `wifi`     | -                           | ESP-IDF WiFi STA         |

pub mod hardware;
pub mod mqtt;
pub mod wifi;

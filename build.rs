fn main() {
    // The ESP-IDF environment is only needed for the device binary.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}

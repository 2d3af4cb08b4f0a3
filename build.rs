fn main() {
    // Emits the ESP-IDF link args and chip cfgs (`esp32s3`, ...) when
    // building for the device. Host builds need nothing from here.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}

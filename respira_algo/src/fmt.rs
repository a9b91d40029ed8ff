// Logging front for the control core.
//
// The macros forward to `defmt` on the MCU (feature `defmt`), to the `log` facade on the
// host (feature `log`, enabled for the test builds) and compile to nothing otherwise.
// Arguments are still borrowed in the silent build to keep the call sites free of
// unused-variable warnings.
//
// Format strings must stay compatible with both backends: use `{}` for integers and
// `{:?}` for enums (`Debug` + `defmt::Format`).

// Licensed under the Apache License, Version 2.0
// Copyright 2024 Anton Khrustalev, creapunk.com

#![macro_use]
#![allow(unused_macros)]

macro_rules! log_event {
    ($level:ident, $s:literal $(, $x:expr)* $(,)?) => {{
        #[cfg(feature = "defmt")]
        ::defmt::$level!($s $(, $x)*);
        #[cfg(all(feature = "log", not(feature = "defmt")))]
        ::log::$level!($s $(, $x)*);
        #[cfg(not(any(feature = "defmt", feature = "log")))]
        let _ = ($(&$x,)*);
    }};
}

macro_rules! trace {
    ($($t:tt)*) => { log_event!(trace, $($t)*) };
}

macro_rules! debug {
    ($($t:tt)*) => { log_event!(debug, $($t)*) };
}

macro_rules! info {
    ($($t:tt)*) => { log_event!(info, $($t)*) };
}

macro_rules! warn {
    ($($t:tt)*) => { log_event!(warn, $($t)*) };
}

macro_rules! error {
    ($($t:tt)*) => { log_event!(error, $($t)*) };
}

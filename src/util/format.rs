const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

pub fn pretty_size_from_bytes(bytes: u64) -> String {
    let mut unit = 0;
    let mut scaled = bytes as f64;
    while scaled >= 1024.0 && unit < UNITS.len() - 1 {
        scaled /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.2} {}", scaled, UNITS[unit])
    }
}

use decayrng::{
    find_devices, Device, ModeSession, SpiDriverTransport, POLY_ALTERNATE, POLY_DEFAULT,
};

fn hex_words(values: &[u16]) -> String {
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
    hex::encode(bytes)
}

fn main() -> Result<(), decayrng::Error> {
    env_logger::init();

    let port = std::env::var("DECAYRNG_PORT").ok();
    if port.is_none() && find_devices().is_empty() {
        eprintln!("No SPI adapters found.");
        std::process::exit(1);
    }

    let mut bus = SpiDriverTransport::open(port.as_deref(), None)?;
    println!("Adapter: {}", bus.info()?);

    let mut device = Device::new(bus);
    device.reset_and_self_test()?;
    let mut session = ModeSession::new(device);

    // LFSR, fixed seed, default polynomial
    session.select_lfsr(0xBEEF, POLY_DEFAULT)?;
    let values = session.read_values(10)?;
    println!("\nLFSR seed 0xbeef, polynomial 0: {}", hex_words(&values));

    // Same seed, alternate polynomial
    session.reseed(0xBEEF)?;
    session.set_polynomial(POLY_ALTERNATE)?;
    let values = session.read_values(10)?;
    println!("LFSR seed 0xbeef, polynomial 2: {}", hex_words(&values));

    // Seed harvested from decay timing
    let seed = session.select_lfsr_harvested(POLY_DEFAULT)?;
    let values = session.read_values(10)?;
    println!("LFSR seed {seed:#06x}, polynomial 0: {}", hex_words(&values));

    // Raw decay sampling
    session.select_decay(false)?;
    let values = session.read_values(10)?;
    println!("Decay sampling:                 {}", hex_words(&values));

    session.finish()?;
    Ok(())
}

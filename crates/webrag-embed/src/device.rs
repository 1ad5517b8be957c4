use candle_core::Device;
use tracing::info;

/// Pick the fastest compiled-in device, falling back to CPU.
pub fn select_device() -> Device {
    #[cfg(feature = "cuda")]
    {
        match Device::new_cuda(0) {
            Ok(dev) => {
                info!("Device: CUDA");
                return dev;
            }
            Err(e) => tracing::warn!("CUDA unavailable ({e}), falling back"),
        }
    }
    #[cfg(feature = "metal")]
    {
        match Device::new_metal(0) {
            Ok(dev) => {
                info!("Device: Metal (MPS)");
                return dev;
            }
            Err(e) => tracing::warn!("Metal unavailable ({e}), falling back"),
        }
    }
    info!("Device: CPU");
    Device::Cpu
}

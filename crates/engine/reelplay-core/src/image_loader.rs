//! Fire-and-forget image loading for the raster backend.
//!
//! A load is requested the first time an image element is drawn. The
//! decoded bitmap arrives over a channel and is picked up by
//! [`ImageCache::poll`] at the start of a later frame.

use std::path::Path;

use crossbeam_channel::{Receiver, TryRecvError};
use hashbrown::HashMap;
use tiny_skia::Pixmap;

use crate::error::EngineError;

/// Starts decoding `src` and hands back the channel the result arrives on.
pub trait ImageLoader {
    fn load(&self, src: &str) -> Receiver<crate::Result<Pixmap>>;
}

/// Decodes files on a short-lived worker thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadImageLoader;

impl ImageLoader for ThreadImageLoader {
    fn load(&self, src: &str) -> Receiver<crate::Result<Pixmap>> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let src = src.to_string();
        let spawned = std::thread::Builder::new()
            .name("reelplay-image".into())
            .spawn({
                let src = src.clone();
                move || {
                    // receiver may be gone if the backend was destroyed
                    let _ = tx.send(decode_file(Path::new(&src)));
                }
            });
        if let Err(err) = spawned {
            log::error!("could not spawn image loader for {src}: {err}");
        }
        rx
    }
}

/// Decode an image file into a premultiplied pixmap.
pub fn decode_file(path: &Path) -> crate::Result<Pixmap> {
    let src = path.display().to_string();
    let img = image::open(path).map_err(|e| EngineError::ImageLoad {
        src: src.clone(),
        reason: e.to_string(),
    })?;
    rgba_to_pixmap(&src, img.to_rgba8())
}

/// Decode an in-memory encoded image.
pub fn decode_bytes(src: &str, bytes: &[u8]) -> crate::Result<Pixmap> {
    let img = image::load_from_memory(bytes).map_err(|e| EngineError::ImageLoad {
        src: src.to_string(),
        reason: e.to_string(),
    })?;
    rgba_to_pixmap(src, img.to_rgba8())
}

fn rgba_to_pixmap(src: &str, rgba: image::RgbaImage) -> crate::Result<Pixmap> {
    let (w, h) = rgba.dimensions();
    let mut data = rgba.into_raw();
    for px in data.chunks_exact_mut(4) {
        let a = px[3] as u32;
        px[0] = (px[0] as u32 * a / 255) as u8;
        px[1] = (px[1] as u32 * a / 255) as u8;
        px[2] = (px[2] as u32 * a / 255) as u8;
    }
    let size = tiny_skia::IntSize::from_wh(w, h).ok_or_else(|| EngineError::ImageLoad {
        src: src.to_string(),
        reason: "empty image".to_string(),
    })?;
    Pixmap::from_vec(data, size).ok_or_else(|| EngineError::ImageLoad {
        src: src.to_string(),
        reason: "pixel buffer size mismatch".to_string(),
    })
}

enum Slot {
    Pending(Receiver<crate::Result<Pixmap>>),
    Ready(Pixmap),
    Failed,
}

struct Entry {
    src: String,
    slot: Slot,
}

/// Per-element bitmap cache.
pub struct ImageCache {
    loader: Box<dyn ImageLoader>,
    entries: HashMap<String, Entry>,
}

impl ImageCache {
    pub fn new(loader: Box<dyn ImageLoader>) -> Self {
        Self {
            loader,
            entries: HashMap::new(),
        }
    }

    /// The cached bitmap for `element_id`, starting a load if there is none.
    /// A changed `src` discards the old entry.
    pub fn get_or_request(&mut self, element_id: &str, src: &str) -> Option<&Pixmap> {
        let stale = self
            .entries
            .get(element_id)
            .map(|e| e.src != src)
            .unwrap_or(true);
        if stale {
            log::debug!("loading image {src} for {element_id}");
            let rx = self.loader.load(src);
            self.entries.insert(
                element_id.to_string(),
                Entry {
                    src: src.to_string(),
                    slot: Slot::Pending(rx),
                },
            );
        }
        match &self.entries.get(element_id)?.slot {
            Slot::Ready(p) => Some(p),
            _ => None,
        }
    }

    /// Move finished loads into the cache. Returns how many became ready.
    pub fn poll(&mut self) -> usize {
        let mut ready = 0;
        for (id, entry) in self.entries.iter_mut() {
            let Slot::Pending(rx) = &entry.slot else {
                continue;
            };
            match rx.try_recv() {
                Ok(Ok(pixmap)) => {
                    entry.slot = Slot::Ready(pixmap);
                    ready += 1;
                }
                Ok(Err(err)) => {
                    log::warn!("image for {id} failed: {err}");
                    entry.slot = Slot::Failed;
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => {
                    log::warn!("image loader for {id} went away");
                    entry.slot = Slot::Failed;
                }
            }
        }
        ready
    }

    pub fn is_ready(&self, element_id: &str) -> bool {
        matches!(
            self.entries.get(element_id),
            Some(Entry {
                slot: Slot::Ready(_),
                ..
            })
        )
    }

    pub fn is_failed(&self, element_id: &str) -> bool {
        matches!(
            self.entries.get(element_id),
            Some(Entry {
                slot: Slot::Failed,
                ..
            })
        )
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Keep only the entries for which `keep(element_id, src)` holds.
    pub fn retain(&mut self, mut keep: impl FnMut(&str, &str) -> bool) {
        self.entries.retain(|id, entry| keep(id, &entry.src));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn wait_until(cache: &mut ImageCache, id: &str) {
        for _ in 0..200 {
            cache.poll();
            if cache.is_ready(id) || cache.is_failed(id) {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn decodes_png_bytes_premultiplied() {
        let mut img = image::RgbaImage::new(1, 1);
        img.put_pixel(0, 0, image::Rgba([255, 0, 0, 128]));
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        let pixmap = decode_bytes("mem.png", &bytes).unwrap();
        assert_eq!(pixmap.data(), &[128, 0, 0, 128]);
    }

    #[test]
    fn thread_loader_delivers_decoded_file() {
        let dir = std::env::temp_dir().join(format!("reelplay-img-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("green.png");
        image::RgbaImage::from_pixel(3, 2, image::Rgba([0, 255, 0, 255]))
            .save(&path)
            .unwrap();

        let mut cache = ImageCache::new(Box::new(ThreadImageLoader));
        let src = path.to_string_lossy().to_string();
        assert!(cache.get_or_request("img", &src).is_none());
        wait_until(&mut cache, "img");
        let pixmap = cache.get_or_request("img", &src).unwrap();
        assert_eq!((pixmap.width(), pixmap.height()), (3, 2));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_marks_entry_failed() {
        let mut cache = ImageCache::new(Box::new(ThreadImageLoader));
        cache.get_or_request("img", "/no/such/image.png");
        wait_until(&mut cache, "img");
        assert!(cache.is_failed("img"));
        // failed entries are not retried for the same src
        assert!(cache.get_or_request("img", "/no/such/image.png").is_none());
        assert!(cache.is_failed("img"));
    }
}

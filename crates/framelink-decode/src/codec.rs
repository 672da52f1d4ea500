/// Decoding half of a visual codec.
pub trait CodeReader {
    type Image;

    /// Decode one image. `threshold` overrides the binarization threshold;
    /// `None` selects the codec's histogram-based binarization.
    fn decode(&self, image: &Self::Image, threshold: Option<u8>) -> Option<String>;
}

/// Encoding half of a visual codec.
pub trait CodeWriter {
    type Image;

    /// Render `text` as an image, or `None` if it does not fit.
    fn encode(&self, text: &str) -> Option<Self::Image>;
}

/// Codec whose "image" is the text line itself.
///
/// Used where frames cross the boundary as text, one per line: an empty
/// line stands for a capture that could not be decoded. The threshold is
/// ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineCodec;

impl CodeReader for LineCodec {
    type Image = String;

    fn decode(&self, image: &String, _threshold: Option<u8>) -> Option<String> {
        let text = image.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

impl CodeWriter for LineCodec {
    type Image = String;

    fn encode(&self, text: &str) -> Option<String> {
        (!text.contains('\n')).then(|| text.to_string())
    }
}

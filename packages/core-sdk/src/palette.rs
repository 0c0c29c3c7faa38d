use crate::error::SuggestError;

/** \brief 背景色相对前景色向白色混合的比例。 */
const LIGHTEN_RATIO: f64 = 0.8;

/**
 * \brief 分类图标词表（Ionicons，带 -outline 后缀），顺序固定。
 */
pub const CATEGORY_ICONS: [&str; 20] = [
    "briefcase-outline",
    "home-outline",
    "bulb-outline",
    "person-outline",
    "fitness-outline",
    "airplane-outline",
    "cart-outline",
    "school-outline",
    "heart-outline",
    "star-outline",
    "restaurant-outline",
    "film-outline",
    "musical-note-outline",
    "football-outline",
    "color-palette-outline",
    "code-slash-outline",
    "paw-outline",
    "umbrella-outline",
    "medkit-outline",
    "car-outline",
];

/**
 * \brief 预设颜色。只保存前景色，背景色总是通过 lighten 推导。
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorPreset {
    /** \brief 便于日志阅读的名称 */
    pub name: &'static str,
    /** \brief RGB 分量 */
    pub rgb: [u8; 3],
}

impl ColorPreset {
    const fn new(name: &'static str, rgb: [u8; 3]) -> Self {
        Self { name, rgb }
    }

    /** \brief 前景色，形如 `#10B981`。 */
    pub fn color(&self) -> String {
        let [r, g, b] = self.rgb;
        format!("#{r:02X}{g:02X}{b:02X}")
    }

    /** \brief 由前景色推导的背景色。 */
    pub fn background(&self) -> String {
        to_hex(lighten_rgb(self.rgb))
    }
}

/**
 * \brief 预设颜色表，关键词表按下标引用，顺序固定。
 */
pub const COLOR_PRESETS: [ColorPreset; 17] = [
    ColorPreset::new("blue", [0x00, 0x7A, 0xFF]),
    ColorPreset::new("orange", [0xFF, 0x95, 0x00]),
    ColorPreset::new("dark-yellow", [0xB8, 0x86, 0x0B]),
    ColorPreset::new("purple", [0x9C, 0x27, 0xB0]),
    ColorPreset::new("emerald", [0x10, 0xB9, 0x81]),
    ColorPreset::new("red", [0xDC, 0x26, 0x26]),
    ColorPreset::new("pink", [0xEC, 0x48, 0x99]),
    ColorPreset::new("teal", [0x14, 0xB8, 0xA6]),
    ColorPreset::new("amber", [0xF5, 0x9E, 0x0B]),
    ColorPreset::new("indigo", [0x63, 0x66, 0xF1]),
    ColorPreset::new("violet", [0x8B, 0x5C, 0xF6]),
    ColorPreset::new("rose", [0xE1, 0x1D, 0x48]),
    ColorPreset::new("fuchsia", [0xD9, 0x46, 0xEF]),
    ColorPreset::new("brown", [0xA1, 0x62, 0x07]),
    ColorPreset::new("lime", [0x65, 0xA3, 0x0D]),
    ColorPreset::new("slate", [0x47, 0x55, 0x69]),
    ColorPreset::new("deep-orange", [0xEA, 0x58, 0x0C]),
];

/**
 * \brief 解析 `#RRGGBB`（大小写不敏感）；其他格式返回 None。
 */
pub fn parse_hex(color: &str) -> Option<[u8; 3]> {
    let digits = color.strip_prefix('#')?;
    if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
    Some([channel(0)?, channel(2)?, channel(4)?])
}

/** \brief 是否符合 `^#[0-9A-Fa-f]{6}$`。 */
pub fn is_hex_color(color: &str) -> bool {
    parse_hex(color).is_some()
}

/**
 * \brief 每个通道按 `c + (255 - c) * 0.8` 向白色混合并四舍五入。
 */
pub fn lighten_rgb(rgb: [u8; 3]) -> [u8; 3] {
    rgb.map(|c| {
        let c = f64::from(c);
        // 结果落在 [c, 255]，round 对非负数与 JS Math.round 一致
        (c + (255.0 - c) * LIGHTEN_RATIO).round().clamp(0.0, 255.0) as u8
    })
}

/** \brief 输出小写、两位补零的十六进制颜色。 */
pub fn to_hex(rgb: [u8; 3]) -> String {
    let [r, g, b] = rgb;
    format!("#{r:02x}{g:02x}{b:02x}")
}

/**
 * \brief 由前景色推导背景色；所有路径共用此变换。
 */
pub fn lighten(color: &str) -> Result<String, SuggestError> {
    parse_hex(color)
        .map(|rgb| to_hex(lighten_rgb(rgb)))
        .ok_or_else(|| SuggestError::Validation(format!("not a #RRGGBB color: {color:?}")))
}

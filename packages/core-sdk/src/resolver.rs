use crate::models::StyleSuggestion;
use crate::palette::{ColorPreset, CATEGORY_ICONS, COLOR_PRESETS};

/**
 * \brief 关键词表项：关键词、图标、预设颜色下标。
 */
#[derive(Debug, Clone, Copy)]
pub struct KeywordStyle {
    pub keyword: &'static str,
    pub icon: &'static str,
    pub preset: usize,
}

const fn kw(keyword: &'static str, icon: &'static str, preset: usize) -> KeywordStyle {
    KeywordStyle {
        keyword,
        icon,
        preset,
    }
}

/**
 * \brief 有序关键词表，按表顺序取第一个命中项。
 */
pub const KEYWORD_STYLES: [KeywordStyle; 34] = [
    // 工作
    kw("trabajo", "briefcase-outline", 0),
    kw("oficina", "briefcase-outline", 0),
    kw("proyecto", "code-slash-outline", 6),
    kw("reunión", "people-outline", 0),
    // 个人与家庭
    kw("casa", "home-outline", 1),
    kw("hogar", "home-outline", 1),
    kw("personal", "person-outline", 8),
    kw("familia", "heart-outline", 7),
    // 学习
    kw("estudio", "school-outline", 2),
    kw("universidad", "school-outline", 2),
    kw("curso", "book-outline", 2),
    kw("aprendizaje", "bulb-outline", 3),
    // 健康
    kw("salud", "medkit-outline", 7),
    kw("ejercicio", "fitness-outline", 4),
    kw("gimnasio", "fitness-outline", 4),
    kw("deporte", "football-outline", 4),
    // 购物与财务
    kw("compras", "cart-outline", 5),
    kw("mercado", "cart-outline", 5),
    kw("dinero", "cash-outline", 5),
    // 休闲
    kw("viaje", "airplane-outline", 9),
    kw("vacaciones", "airplane-outline", 9),
    kw("película", "film-outline", 10),
    kw("música", "musical-note-outline", 11),
    kw("arte", "color-palette-outline", 12),
    // 宠物与自然
    kw("mascota", "paw-outline", 13),
    kw("perro", "paw-outline", 13),
    kw("gato", "paw-outline", 13),
    kw("jardín", "sunny-outline", 14),
    // 交通
    kw("carro", "car-outline", 15),
    kw("auto", "car-outline", 15),
    kw("transporte", "car-outline", 15),
    // 饮食
    kw("comida", "restaurant-outline", 16),
    kw("cocina", "restaurant-outline", 16),
    kw("recetas", "restaurant-outline", 16),
];

/** \brief 哈希路径的说明文本。 */
pub const HASH_REASONING: &str = "local name-based suggestion";

/**
 * \brief 纯本地、确定性的分类样式解析器：关键词表 + 名称哈希。
 */
#[derive(Debug, Clone, Copy, Default)]
pub struct DeterministicStyleResolver;

impl DeterministicStyleResolver {
    pub fn new() -> Self {
        Self
    }

    /**
     * \brief 解析分类名称，总是返回结果。
     */
    pub fn resolve(&self, category_name: &str) -> StyleSuggestion {
        let normalized = normalize(category_name);
        if let Some(entry) = match_keyword(&normalized) {
            return StyleSuggestion::from_preset(
                entry.icon,
                preset_at(entry.preset),
                format!("Suggested from the keyword \"{}\"", entry.keyword),
            );
        }
        let (icon, preset) = hashed_choice(&normalized);
        StyleSuggestion::from_preset(icon, preset, HASH_REASONING.to_string())
    }

    /**
     * \brief 修复网关返回的无效颜色时使用的颜色，与 resolve 选择的颜色一致。
     */
    pub fn fallback_color(&self, category_name: &str) -> String {
        let normalized = normalize(category_name);
        match match_keyword(&normalized) {
            Some(entry) => preset_at(entry.preset).color(),
            None => hashed_choice(&normalized).1.color(),
        }
    }

    /**
     * \brief 网关返回空图标时的替代图标，取自固定图标词表。
     */
    pub fn fallback_icon(&self, category_name: &str) -> &'static str {
        hashed_choice(&normalize(category_name)).0
    }
}

fn normalize(category_name: &str) -> String {
    category_name.trim().to_lowercase()
}

/** \brief 按表顺序返回第一个作为子串出现的关键词。 */
pub fn match_keyword(normalized: &str) -> Option<&'static KeywordStyle> {
    KEYWORD_STYLES
        .iter()
        .find(|entry| normalized.contains(entry.keyword))
}

fn preset_at(index: usize) -> &'static ColorPreset {
    &COLOR_PRESETS[index % COLOR_PRESETS.len()]
}

/**
 * \brief 32 位有符号多项式哈希（`h = h * 31 + unit`，按 UTF-16 码元，补码回绕）。
 */
pub fn name_hash(normalized: &str) -> i32 {
    normalized
        .encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

/** \brief 由同一哈希分别得到图标下标与颜色下标。 */
pub fn hashed_indices(normalized: &str) -> (usize, usize) {
    // unsigned_abs 让 i32::MIN 也有定义
    let magnitude = name_hash(normalized).unsigned_abs() as usize;
    (
        magnitude % CATEGORY_ICONS.len(),
        magnitude % COLOR_PRESETS.len(),
    )
}

fn hashed_choice(normalized: &str) -> (&'static str, &'static ColorPreset) {
    let (icon_index, preset_index) = hashed_indices(normalized);
    (CATEGORY_ICONS[icon_index], &COLOR_PRESETS[preset_index])
}

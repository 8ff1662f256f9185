pub mod yandex;

pub use yandex::YandexGeocoder;

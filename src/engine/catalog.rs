use chrono::Utc;

use crate::limits::*;
use crate::model::*;

use super::conflict::{check_len, present};
use super::{Engine, EngineError, Entity};

struct ValidService {
    name: String,
    price: String,
    duration: String,
    description: String,
    features: Vec<String>,
    image_url: Option<String>,
}

fn validate_service(draft: ServiceDraft) -> Result<ValidService, EngineError> {
    let missing: Vec<&'static str> = [("name", &draft.name), ("price", &draft.price), ("duration", &draft.duration)]
        .into_iter()
        .filter(|(_, v)| present(v).is_none())
        .map(|(name, _)| name)
        .collect();
    if !missing.is_empty() {
        return Err(EngineError::MissingFields(missing));
    }

    let text = |v: &Option<String>| present(v).unwrap_or_default().to_string();
    let service = ValidService {
        name: text(&draft.name),
        price: text(&draft.price),
        duration: text(&draft.duration),
        description: text(&draft.description),
        features: draft.features.map(FeatureList::into_vec).unwrap_or_default(),
        image_url: present(&draft.image_url).map(str::to_string),
    };

    check_len("service name too long", &service.name, MAX_TITLE_LEN)?;
    check_len("price too long", &service.price, MAX_SHORT_TEXT_LEN)?;
    check_len("duration too long", &service.duration, MAX_SHORT_TEXT_LEN)?;
    check_len("description too long", &service.description, MAX_DESCRIPTION_LEN)?;
    if service.features.len() > MAX_FEATURES {
        return Err(EngineError::LimitExceeded("too many features"));
    }
    for feature in &service.features {
        check_len("feature too long", feature, MAX_TITLE_LEN)?;
    }
    if let Some(url) = &service.image_url {
        check_len("image_url too long", url, MAX_URL_LEN)?;
    }
    Ok(service)
}

struct ValidGalleryItem {
    title: String,
    description: String,
    image_url: String,
    category: String,
}

fn validate_gallery_item(draft: GalleryDraft) -> Result<ValidGalleryItem, EngineError> {
    let mut missing = Vec::new();
    if present(&draft.title).is_none() {
        missing.push("title");
    }
    if present(&draft.image_url).is_none() {
        missing.push("image_url");
    }
    if !missing.is_empty() {
        return Err(EngineError::MissingFields(missing));
    }

    let text = |v: &Option<String>| present(v).unwrap_or_default().to_string();
    let item = ValidGalleryItem {
        title: text(&draft.title),
        description: text(&draft.description),
        image_url: text(&draft.image_url),
        category: present(&draft.category)
            .unwrap_or(DEFAULT_GALLERY_CATEGORY)
            .to_string(),
    };

    check_len("title too long", &item.title, MAX_TITLE_LEN)?;
    check_len("description too long", &item.description, MAX_DESCRIPTION_LEN)?;
    check_len("image_url too long", &item.image_url, MAX_URL_LEN)?;
    check_len("category too long", &item.category, MAX_SHORT_TEXT_LEN)?;
    Ok(item)
}

impl Engine {
    fn catalog_len(&self) -> usize {
        self.services.len() + self.gallery.len()
    }

    pub async fn create_service(&self, draft: ServiceDraft) -> Result<Service, EngineError> {
        let v = validate_service(draft)?;
        let _gate = self.write_gate.read().await;
        let _catalog = self.catalog_lock.lock().await;
        if self.catalog_len() >= MAX_CATALOG_ITEMS {
            return Err(EngineError::LimitExceeded("too many catalog items"));
        }

        let service = Service {
            id: self.seq.next_service(),
            name: v.name,
            price: v.price,
            duration: v.duration,
            description: v.description,
            features: v.features,
            image_url: v.image_url,
        };
        self.persist_catalog(&Event::ServiceCreated { service: service.clone() }).await?;
        tracing::info!(service_id = service.id, name = %service.name, "service created");
        Ok(service)
    }

    /// Replace every field of a service.
    pub async fn update_service(&self, id: Id, draft: ServiceDraft) -> Result<Service, EngineError> {
        let v = validate_service(draft)?;
        let _gate = self.write_gate.read().await;
        let _catalog = self.catalog_lock.lock().await;
        if !self.services.contains_key(&id) {
            return Err(EngineError::NotFound(Entity::Service, id));
        }

        let service = Service {
            id,
            name: v.name,
            price: v.price,
            duration: v.duration,
            description: v.description,
            features: v.features,
            image_url: v.image_url,
        };
        self.persist_catalog(&Event::ServiceUpdated { service: service.clone() }).await?;
        tracing::info!(service_id = id, "service updated");
        Ok(service)
    }

    pub async fn delete_service(&self, id: Id) -> Result<(), EngineError> {
        let _gate = self.write_gate.read().await;
        let _catalog = self.catalog_lock.lock().await;
        if !self.services.contains_key(&id) {
            return Err(EngineError::NotFound(Entity::Service, id));
        }
        self.persist_catalog(&Event::ServiceDeleted { id }).await?;
        tracing::info!(service_id = id, "service deleted");
        Ok(())
    }

    pub async fn create_gallery_item(&self, draft: GalleryDraft) -> Result<GalleryItem, EngineError> {
        let v = validate_gallery_item(draft)?;
        let _gate = self.write_gate.read().await;
        let _catalog = self.catalog_lock.lock().await;
        if self.catalog_len() >= MAX_CATALOG_ITEMS {
            return Err(EngineError::LimitExceeded("too many catalog items"));
        }

        let item = GalleryItem {
            id: self.seq.next_gallery(),
            title: v.title,
            description: v.description,
            image_url: v.image_url,
            category: v.category,
            created_at: Utc::now(),
        };
        self.persist_catalog(&Event::GalleryItemCreated { item: item.clone() }).await?;
        tracing::info!(item_id = item.id, category = %item.category, "gallery item created");
        Ok(item)
    }

    /// Replace the editable fields of a gallery item; `created_at` is kept.
    pub async fn update_gallery_item(&self, id: Id, draft: GalleryDraft) -> Result<GalleryItem, EngineError> {
        let v = validate_gallery_item(draft)?;
        let _gate = self.write_gate.read().await;
        let _catalog = self.catalog_lock.lock().await;
        let created_at = self
            .gallery
            .get(&id)
            .map(|e| e.value().created_at)
            .ok_or(EngineError::NotFound(Entity::GalleryItem, id))?;

        let item = GalleryItem {
            id,
            title: v.title,
            description: v.description,
            image_url: v.image_url,
            category: v.category,
            created_at,
        };
        self.persist_catalog(&Event::GalleryItemUpdated { item: item.clone() }).await?;
        tracing::info!(item_id = id, "gallery item updated");
        Ok(item)
    }

    pub async fn delete_gallery_item(&self, id: Id) -> Result<(), EngineError> {
        let _gate = self.write_gate.read().await;
        let _catalog = self.catalog_lock.lock().await;
        if !self.gallery.contains_key(&id) {
            return Err(EngineError::NotFound(Entity::GalleryItem, id));
        }
        self.persist_catalog(&Event::GalleryItemDeleted { id }).await?;
        tracing::info!(item_id = id, "gallery item deleted");
        Ok(())
    }
}
